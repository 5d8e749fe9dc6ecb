//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Whitespace-separated word count.
pub fn word_count(s: &str) -> usize {
  s.split_whitespace().count()
}

/// Local reading-time heuristic: ceil(words / wpm), never below one minute.
/// The 200 wpm calibration lives in `Calibration`, not here.
pub fn reading_minutes(text: &str, words_per_minute: u32) -> u32 {
  let wpm = words_per_minute.max(1) as usize;
  let words = word_count(text);
  (((words + wpm - 1) / wpm) as u32).max(1)
}

/// Find the first `[...]` bracketed substring of a noisy model response.
/// Used as the second parsing attempt when the trimmed response is not
/// itself a JSON array.
pub fn extract_json_array(s: &str) -> Option<&str> {
  let start = s.find('[')?;
  let end = s.rfind(']')?;
  if end > start { Some(&s[start..=end]) } else { None }
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  // Back off to a char boundary so slicing can't panic on multibyte text.
  let mut cut = max;
  while cut > 0 && !s.is_char_boundary(cut) {
    cut -= 1;
  }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fill_template_replaces_all_occurrences() {
    let out = fill_template("{a} and {b} and {a}", &[("a", "x"), ("b", "y")]);
    assert_eq!(out, "x and y and x");
  }

  #[test]
  fn reading_minutes_rounds_up_and_floors_at_one() {
    assert_eq!(reading_minutes("", 200), 1);
    let two_hundred_one = vec!["w"; 201].join(" ");
    assert_eq!(reading_minutes(&two_hundred_one, 200), 2);
  }

  #[test]
  fn extract_json_array_finds_outermost_brackets() {
    let noisy = "Sure! Here you go:\n[{\"a\":1},{\"a\":[2]}]\nHope that helps.";
    assert_eq!(extract_json_array(noisy), Some("[{\"a\":1},{\"a\":[2]}]"));
    assert_eq!(extract_json_array("no array here"), None);
    assert_eq!(extract_json_array("] backwards ["), None);
  }
}
