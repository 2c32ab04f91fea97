//! Authentication plugins
//!
//! MySQL negotiates an auth plugin during the handshake and may switch
//! plugins mid-exchange (AuthSwitchRequest). Supported here:
//! `mysql_native_password` (SHA1) and `caching_sha2_password` (SHA256, the
//! MySQL 8 default).

pub mod caching_sha2;
pub mod native;

use crate::metrics::labels;
use crate::{Error, Result};

/// Build the auth response for the given plugin and server nonce.
///
/// An empty password always produces an empty response, for every plugin.
pub fn auth_response(plugin: &str, password: &str, nonce: &[u8]) -> Result<Vec<u8>> {
    match plugin {
        labels::PLUGIN_NATIVE => Ok(native::scramble(password, nonce).unwrap_or_default()),
        labels::PLUGIN_CACHING_SHA2 => {
            Ok(caching_sha2::scramble(password, nonce).unwrap_or_default())
        }
        other => Err(Error::Authentication(format!(
            "unsupported auth plugin '{}'. Supported: {}, {}",
            other,
            labels::PLUGIN_NATIVE,
            labels::PLUGIN_CACHING_SHA2
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_native() {
        let out = auth_response("mysql_native_password", "pw", &[0u8; 20]).unwrap();
        assert_eq!(out.len(), 20);
    }

    #[test]
    fn test_dispatch_caching_sha2() {
        let out = auth_response("caching_sha2_password", "pw", &[0u8; 20]).unwrap();
        assert_eq!(out.len(), 32);
    }

    #[test]
    fn test_dispatch_empty_password() {
        assert!(auth_response("mysql_native_password", "", &[0u8; 20])
            .unwrap()
            .is_empty());
        assert!(auth_response("caching_sha2_password", "", &[0u8; 20])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_dispatch_unknown_plugin() {
        let err = auth_response("mysql_old_password", "pw", &[0u8; 20]).unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
        assert!(err.to_string().contains("mysql_old_password"));
    }
}
