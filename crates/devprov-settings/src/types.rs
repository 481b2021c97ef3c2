//! Settings keys and value helpers.

use serde_json::{Map, Value};

/// An ordered settings object as exchanged on the settings channel.
pub type Settings = Map<String, Value>;

// ============================================================================
// Reserved Keys
// ============================================================================

/// Control key: persist the written settings.
pub const KEY_SAVE: &str = "save";
/// Control key: reset settings to defaults.
pub const KEY_RESET: &str = "reset";
/// Lock flag; once set, only signed writes are accepted.
pub const KEY_LOCK: &str = "settings/lock";
/// Access control list for key slot 0.
pub const KEY_ACL_0: &str = "settings/acl_0";
/// Key slot 0.
pub const KEY_KEY_0: &str = "settings/key_0";
/// Key slot 1.
pub const KEY_KEY_1: &str = "settings/key_1";
/// Key slot 2.
pub const KEY_KEY_2: &str = "settings/key_2";
/// Device serial embedded in signed content.
pub const KEY_SERIAL: &str = "sn";
/// Signed envelope content field.
pub const KEY_CONTENT: &str = "cnt";
/// Signed envelope signature field.
pub const KEY_SIGNATURE: &str = "sig";

/// Keys that request actions and are never stored.
pub const CONTROL_KEYS: [&str; 2] = [KEY_SAVE, KEY_RESET];

/// Keys the device never reports back: control keys and key material.
pub const WRITE_ONLY_KEYS: [&str; 5] = [KEY_SAVE, KEY_RESET, KEY_KEY_0, KEY_KEY_1, KEY_KEY_2];

/// ACL granting key slot 0 access to every setting.
pub const ACL_ALL_ACCESS: &str = "//////////////////////////////////////////8=";

/// Interpret a settings value as a flag.
///
/// Follows the firmware's loose notion of "set": `null`, `false`, zero, and
/// empty strings, arrays and objects are unset; everything else is set.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Whether a snapshot reports the device as locked.
pub fn is_locked(snapshot: &Settings) -> bool {
    snapshot.get(KEY_LOCK).is_some_and(is_truthy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("x")));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!([])));
    }

    #[test]
    fn test_is_locked() {
        let locked = json!({"settings/lock": true});
        let unlocked = json!({"settings/lock": false, "app/brightness": 3});
        assert!(is_locked(locked.as_object().unwrap()));
        assert!(!is_locked(unlocked.as_object().unwrap()));
        assert!(!is_locked(&Settings::new()));
    }
}
