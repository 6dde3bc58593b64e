/// Expand Unix-style environment variables (`${VAR}` and `$VAR`).
///
/// Unset `${VAR}` references expand to an empty string; unset `$VAR`
/// references are left as written. Values are inserted verbatim and never
/// re-expanded.
pub fn expand_env_vars(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut result = String::with_capacity(value.len());
    let mut i = 0;

    while let Some(pos) = value[i..].find('$') {
        let var_start = i + pos;
        result.push_str(&value[i..var_start]);

        if bytes.get(var_start + 1) == Some(&b'{') {
            match value[var_start + 2..].find('}') {
                Some(end) => {
                    let var_name = &value[var_start + 2..var_start + 2 + end];
                    if let Ok(var_value) = std::env::var(var_name) {
                        result.push_str(&var_value);
                    }
                    i = var_start + 3 + end;
                }
                None => {
                    // unterminated, keep the rest as written
                    i = var_start;
                    break;
                }
            }
            continue;
        }

        let mut var_end = var_start + 1;
        while var_end < bytes.len() && is_name_byte(bytes[var_end]) {
            var_end += 1;
        }

        if var_end == var_start + 1 {
            result.push('$');
            i = var_start + 1;
            continue;
        }

        let var_name = &value[var_start + 1..var_end];
        match std::env::var(var_name) {
            Ok(var_value) => result.push_str(&var_value),
            Err(_) => result.push_str(&value[var_start..var_end]),
        }
        i = var_end;
    }

    result.push_str(&value[i..]);
    result
}

fn is_name_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Expand an optional string field in place.
pub fn expand_optional(value: &mut Option<String>) {
    if let Some(inner) = value.as_mut() {
        if inner.contains('$') {
            *inner = expand_env_vars(inner);
        }
    }
}
