//! Human-readable counts for progress logs.

const SUFFIXES: [&str; 5] = ["", "K", "M", "G", "P"];

/// Shorten a count to one decimal with a magnitude suffix: `12345` → `12.3K`.
pub fn millify(n: f64) -> String {
    if n == 0.0 || !n.is_finite() {
        return format!("{:.1}", n);
    }
    let idx = ((n.abs().log10() / 3.0).floor() as i64).clamp(0, SUFFIXES.len() as i64 - 1) as usize;
    format!("{:.1}{}", n / 10f64.powi(3 * idx as i32), SUFFIXES[idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millify() {
        assert_eq!(millify(0.0), "0.0");
        assert_eq!(millify(999.0), "999.0");
        assert_eq!(millify(12_345.0), "12.3K");
        assert_eq!(millify(2_500_000.0), "2.5M");
        assert_eq!(millify(0.5), "0.5");
    }
}
