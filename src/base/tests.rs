use crate::base::neterror::NetError;
use crate::http::retry::RetryError;

#[test]
fn test_net_error_roundtrip() {
    let original = NetError::ConnectionRefused;
    let code = original.as_i32();
    assert_eq!(code, -102);
    let converted = NetError::from(code);
    assert!(matches!(converted, NetError::ConnectionRefused));

    let custom = NetError::CookieInvalidMaxAge;
    let custom_code = custom.as_i32();
    assert_eq!(custom_code, -1002);
    assert!(matches!(
        NetError::from(custom_code),
        NetError::CookieInvalidMaxAge
    ));
}

#[test]
fn test_retry_error_codes() {
    let err: NetError = RetryError::Aborted.into();
    assert_eq!(NetError::from(err.as_i32()), err);
    assert_eq!(err.to_string(), "RETRY_IS_ABORTED");
}

#[test]
fn test_unknown_error() {
    let err = NetError::from(-9999);
    assert!(matches!(err, NetError::Unknown(-9999)));
    assert_eq!(NetError::from(-105), NetError::Unknown(-105));
}

#[test]
fn test_collision_avoidance() {
    // Blob error range in Chromium's net_error_list.h
    let blob_range = -906..=-900;

    for err in [
        NetError::CookieInvalidName,
        NetError::CookieInvalidPrefix,
        NetError::Retry(RetryError::MaxRetriesReached),
    ] {
        assert!(!blob_range.contains(&err.as_i32()));
    }
}
