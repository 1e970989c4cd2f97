//! Fractional index keys for manual ordering.
//!
//! A key is an integer part followed by an optional fraction, both over a
//! base-62 alphabet, and keys compare lexicographically. The integer head
//! encodes its own length (`a` is two characters, `b` three, ...; `Z` two,
//! `Y` three, ... below zero), so appending at either end increments an
//! integer and key length grows logarithmically. Inserting between two keys
//! that share an integer uses the fraction, which never ends in `0`.

use crate::error::{Error, Result};

const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const BASE: usize = DIGITS.len();

/// Key returned when there are no neighbours.
pub const FIRST_KEY: &str = "a0";

/// `A` followed by 26 zeros; nothing sorts before it.
fn smallest_integer() -> String {
    let mut key = String::from("A");
    key.push_str(&"0".repeat(26));
    key
}

/// Generate a key sorting strictly between `before` and `after`.
///
/// `None` on either side means unbounded.
pub fn key_between(before: Option<&str>, after: Option<&str>) -> Result<String> {
    if let Some(a) = before {
        validate(a)?;
    }
    if let Some(b) = after {
        validate(b)?;
    }

    match (before, after) {
        (None, None) => Ok(FIRST_KEY.to_string()),
        (None, Some(b)) => {
            let int_b = integer_part(b)?;
            let frac_b = &b[int_b.len()..];
            if int_b == smallest_integer() {
                return Ok(format!("{int_b}{}", midpoint(b"", Some(frac_b.as_bytes()))));
            }
            if int_b.len() < b.len() {
                return Ok(int_b.to_string());
            }
            decrement_integer(int_b)
                .ok_or_else(|| Error::InvalidInput("cannot order before the smallest key".into()))
        }
        (Some(a), None) => {
            let int_a = integer_part(a)?;
            let frac_a = &a[int_a.len()..];
            Ok(increment_integer(int_a).unwrap_or_else(|| {
                format!("{int_a}{}", midpoint(frac_a.as_bytes(), None))
            }))
        }
        (Some(a), Some(b)) => {
            if a >= b {
                return Err(Error::InvalidInput(format!(
                    "fractional bounds out of order: {a:?} >= {b:?}"
                )));
            }
            let int_a = integer_part(a)?;
            let frac_a = &a[int_a.len()..];
            let int_b = integer_part(b)?;
            let frac_b = &b[int_b.len()..];
            if int_a == int_b {
                return Ok(format!(
                    "{int_a}{}",
                    midpoint(frac_a.as_bytes(), Some(frac_b.as_bytes()))
                ));
            }
            match increment_integer(int_a) {
                Some(next) if next.as_str() < b => Ok(next),
                Some(_) => Ok(format!("{int_a}{}", midpoint(frac_a.as_bytes(), None))),
                None => Err(Error::InvalidInput("integer part overflowed".into())),
            }
        }
    }
}

/// Generate `count` ascending keys after `before`.
pub fn keys_after(before: Option<&str>, count: usize) -> Result<Vec<String>> {
    let mut keys = Vec::with_capacity(count);
    let mut last = before.map(str::to_string);
    for _ in 0..count {
        let next = key_between(last.as_deref(), None)?;
        keys.push(next.clone());
        last = Some(next);
    }
    Ok(keys)
}

fn validate(key: &str) -> Result<()> {
    if let Some(bad) = key.bytes().find(|byte| digit_value(*byte).is_none()) {
        return Err(Error::InvalidInput(format!(
            "invalid fractional key character {:?}",
            char::from(bad)
        )));
    }
    if key == smallest_integer() {
        return Err(Error::InvalidInput("key is the reserved minimum".into()));
    }
    let int = integer_part(key)?;
    if key[int.len()..].ends_with('0') {
        return Err(Error::InvalidInput(format!(
            "fractional key must not end in '0': {key:?}"
        )));
    }
    Ok(())
}

/// Length of the integer part announced by `head`.
fn integer_length(head: u8) -> Option<usize> {
    match head {
        b'a'..=b'z' => Some(usize::from(head - b'a') + 2),
        b'A'..=b'Z' => Some(usize::from(b'Z' - head) + 2),
        _ => None,
    }
}

fn integer_part(key: &str) -> Result<&str> {
    let length = key
        .bytes()
        .next()
        .and_then(integer_length)
        .ok_or_else(|| Error::InvalidInput(format!("invalid fractional key head: {key:?}")))?;
    key.get(..length)
        .ok_or_else(|| Error::InvalidInput(format!("fractional key too short: {key:?}")))
}

fn increment_integer(int: &str) -> Option<String> {
    let (head, digits) = int.as_bytes().split_first()?;
    let mut digits = digits.to_vec();
    let mut carry = true;
    for slot in digits.iter_mut().rev() {
        let next = digit_value(*slot)? + 1;
        if next == BASE {
            *slot = DIGITS[0];
        } else {
            *slot = DIGITS[next];
            carry = false;
            break;
        }
    }

    let head = if carry {
        match *head {
            b'Z' => return Some(FIRST_KEY.to_string()),
            b'z' => return None,
            head => {
                let head = head + 1;
                if head > b'a' {
                    digits.push(DIGITS[0]);
                } else {
                    digits.pop();
                }
                head
            }
        }
    } else {
        *head
    };
    Some(assemble(head, &digits))
}

fn decrement_integer(int: &str) -> Option<String> {
    let (head, digits) = int.as_bytes().split_first()?;
    let mut digits = digits.to_vec();
    let mut borrow = true;
    for slot in digits.iter_mut().rev() {
        let value = digit_value(*slot)?;
        if value == 0 {
            *slot = DIGITS[BASE - 1];
        } else {
            *slot = DIGITS[value - 1];
            borrow = false;
            break;
        }
    }

    let head = if borrow {
        match *head {
            b'a' => return Some(assemble(b'Z', &[DIGITS[BASE - 1]])),
            b'A' => return None,
            head => {
                let head = head - 1;
                if head < b'Z' {
                    digits.push(DIGITS[BASE - 1]);
                } else {
                    digits.pop();
                }
                head
            }
        }
    } else {
        *head
    };
    Some(assemble(head, &digits))
}

fn assemble(head: u8, digits: &[u8]) -> String {
    let mut key = String::with_capacity(digits.len() + 1);
    key.push(char::from(head));
    key.extend(digits.iter().copied().map(char::from));
    key
}

fn digit_value(byte: u8) -> Option<usize> {
    DIGITS.iter().position(|digit| *digit == byte)
}

/// Fraction strictly between `a` and `b` (`b` unbounded when `None`).
fn midpoint(a: &[u8], b: Option<&[u8]>) -> String {
    if let Some(b) = b {
        // Strip the common prefix, padding `a` with zeros.
        let mut n = 0;
        while n < b.len() && a.get(n).copied().unwrap_or(DIGITS[0]) == b[n] {
            n += 1;
        }
        if n > 0 {
            let prefix = String::from_utf8_lossy(&b[..n]).into_owned();
            let rest_a: &[u8] = if n < a.len() { &a[n..] } else { &[] };
            return prefix + &midpoint(rest_a, Some(&b[n..]));
        }
    }

    let digit_a = a.first().and_then(|byte| digit_value(*byte)).unwrap_or(0);
    let digit_b = b
        .and_then(|b| b.first())
        .and_then(|byte| digit_value(*byte))
        .unwrap_or(BASE);

    if digit_b - digit_a > 1 {
        let mid = (digit_a + digit_b + 1) / 2;
        return char::from(DIGITS[mid]).to_string();
    }

    match b {
        Some(b) if b.len() > 1 => char::from(b[0]).to_string(),
        _ => {
            let tail: &[u8] = if a.is_empty() { &[] } else { &a[1..] };
            let mut key = char::from(DIGITS[digit_a]).to_string();
            key.push_str(&midpoint(tail, None));
            key
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unbounded_key_is_integer_zero() {
        assert_eq!(key_between(None, None).unwrap(), "a0");
    }

    #[test]
    fn appends_increment_the_integer() {
        assert_eq!(key_between(Some("a0"), None).unwrap(), "a1");
        assert_eq!(key_between(Some("az"), None).unwrap(), "b00");
        assert_eq!(key_between(Some("a0V"), None).unwrap(), "a1");
        assert_eq!(key_between(None, Some("a0")).unwrap(), "Zz");
        assert_eq!(key_between(None, Some("a0V")).unwrap(), "a0");
    }

    #[test]
    fn keys_sort_between_bounds() {
        let cases = [
            (None, Some("a0")),
            (Some("a0"), None),
            (Some("a0"), Some("a1")),
            (Some("a1"), Some("a2")),
            (Some("a0"), Some("a0V")),
            (Some("a1"), Some("b00")),
            (Some("Zz"), Some("a0")),
            (Some("zzzzzzzzzzzzzzzzzzzzzzzzzzz"), None),
        ];
        for (before, after) in cases {
            let key = key_between(before, after).unwrap();
            if let Some(before) = before {
                assert!(key.as_str() > before, "{key} > {before}");
            }
            if let Some(after) = after {
                assert!(key.as_str() < after, "{key} < {after}");
            }
            validate(&key).unwrap();
        }
    }

    #[test]
    fn repeated_insertion_stays_ordered() {
        let low = key_between(None, None).unwrap();
        let mut high = key_between(Some(&low), None).unwrap();
        for _ in 0..50 {
            let mid = key_between(Some(&low), Some(&high)).unwrap();
            assert!(low < mid && mid < high);
            high = mid;
        }
    }

    #[test]
    fn tail_appends_stay_short() {
        let keys = keys_after(None, 5_000).unwrap();
        assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(keys.iter().all(|key| key.len() <= 4), "{:?}", keys.last());
    }

    #[test]
    fn keys_after_are_ascending() {
        let keys = keys_after(Some("a0"), 5).unwrap();
        assert_eq!(keys, vec!["a1", "a2", "a3", "a4", "a5"]);
    }

    #[test]
    fn rejects_bad_bounds() {
        assert!(key_between(Some("a2"), Some("a1")).is_err());
        assert!(key_between(Some("a1"), Some("a1")).is_err());
        assert!(key_between(Some("a10"), None).is_err());
        assert!(key_between(Some("a-b"), None).is_err());
        assert!(key_between(Some("b1"), None).is_err());
        assert!(key_between(Some("!"), None).is_err());
    }

    #[test]
    fn sentinel_sorts_before_generated_keys() {
        let first = key_between(None, Some("Zz")).unwrap();
        assert_eq!(first, "Zy");
        assert!(crate::models::UNCATEGORIZED_ORDER < first.as_str());
        assert!(crate::models::UNCATEGORIZED_ORDER < FIRST_KEY);
    }
}
