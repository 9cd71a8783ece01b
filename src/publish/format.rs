//! Social post text for a signal, bounded to a sink's character limit.
//!
//! Lengths are weighted the way X counts them: code points up to U+10FF
//! weigh 1, anything above (emoji, CJK) weighs 2. For sinks that count plain
//! chars the weighted length is an upper bound.

use crate::model::{SignalType, TradingSignal};

pub const TRUNCATION_MARKER: &str = "...";
const HASHTAGS: &str = "#crypto #trading #sentiment";

pub fn direction_marker(kind: SignalType) -> &'static str {
    match kind {
        SignalType::Buy => "🟢",
        SignalType::Sell => "🔴",
        SignalType::Hold => "🟡",
    }
}

fn char_weight(c: char) -> usize {
    if u32::from(c) > 0x10FF {
        2
    } else {
        1
    }
}

/// Post length as X measures it.
pub fn weighted_len(s: &str) -> usize {
    s.chars().map(char_weight).sum()
}

/// Longest prefix of `s` whose weighted length is at most `max`.
fn weighted_prefix(s: &str, max: usize) -> &str {
    let mut used = 0;
    for (i, c) in s.char_indices() {
        used += char_weight(c);
        if used > max {
            return &s[..i];
        }
    }
    s
}

/// Cuts `s` so the result, marker included, has a weighted length of at
/// most `max`.
pub fn truncate_with_marker(s: &str, max: usize) -> String {
    if weighted_len(s) <= max {
        return s.to_string();
    }
    let marker_len = weighted_len(TRUNCATION_MARKER);
    if max <= marker_len {
        return weighted_prefix(s, max).to_string();
    }
    let mut out = weighted_prefix(s, max - marker_len).to_string();
    out.truncate(out.trim_end().len());
    out.push_str(TRUNCATION_MARKER);
    out
}

/// `🟢 #Bitcoin BUY SIGNAL | Sentiment: 0.62 | Confidence: 0.80`, then the
/// reasoning, then hashtags. Only the reasoning is shortened to fit `max_len`;
/// if even the frame does not fit, the whole text is cut.
pub fn format_signal_post(signal: &TradingSignal, max_len: usize) -> String {
    let header = format!(
        "{} #{} {} SIGNAL | Sentiment: {:.2} | Confidence: {:.2}",
        direction_marker(signal.signal_type),
        hashtag(&signal.cryptocurrency),
        signal.signal_type.as_str().to_ascii_uppercase(),
        signal.sentiment_score,
        signal.confidence,
    );
    let reasoning = single_line(&signal.reasoning);

    let frame = weighted_len(&header) + "\n\n".len() + "\n\n".len() + HASHTAGS.len();
    let budget = max_len.saturating_sub(frame);
    let marker_len = weighted_len(TRUNCATION_MARKER);

    let text = if reasoning.is_empty() || budget <= marker_len {
        format!("{header}\n\n{HASHTAGS}")
    } else {
        let body = truncate_with_marker(&reasoning, budget);
        format!("{header}\n\n{body}\n\n{HASHTAGS}")
    };
    truncate_with_marker(&text, max_len)
}

fn hashtag(asset: &str) -> String {
    asset.chars().filter(|c| c.is_alphanumeric()).collect()
}

fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(kind: SignalType, reasoning: &str) -> TradingSignal {
        TradingSignal::new("Bitcoin", kind, 0.8, 0.62).with_reasoning(reasoning)
    }

    #[test]
    fn markers_differ_per_direction() {
        let m: std::collections::HashSet<_> = [SignalType::Buy, SignalType::Sell, SignalType::Hold]
            .into_iter()
            .map(direction_marker)
            .collect();
        assert_eq!(m.len(), 3);
    }

    #[test]
    fn short_post_is_untouched() {
        let out = format_signal_post(&signal(SignalType::Buy, "ETF inflows  keep\ncoming."), 280);
        assert!(out.starts_with("🟢 #Bitcoin BUY SIGNAL | Sentiment: 0.62 | Confidence: 0.80"));
        assert!(out.contains("\n\nETF inflows keep coming.\n\n"));
        assert!(out.ends_with(HASHTAGS));
        assert!(!out.contains(TRUNCATION_MARKER));
    }

    #[test]
    fn long_reasoning_is_cut_with_marker() {
        let long = "word ".repeat(200);
        let out = format_signal_post(&signal(SignalType::Sell, &long), 280);
        assert!(out.chars().count() <= 280);
        assert!(out.contains(&format!("{TRUNCATION_MARKER}\n\n{HASHTAGS}")));
        assert!(out.starts_with("🔴"));
    }

    #[test]
    fn full_length_post_fits_x_weighted_limit() {
        let long = "Spot ETF inflows 🚀 keep accelerating while exchange reserves fall. ".repeat(10);
        let out = format_signal_post(&signal(SignalType::Buy, &long), 280);
        assert!(out.starts_with("🟢"));
        assert!(out.ends_with(HASHTAGS));
        assert!(weighted_len(&out) <= 280, "weighted {}", weighted_len(&out));
        // the frame plus the cut reasoning fills the budget
        assert!(weighted_len(&out) >= 275);
    }

    #[test]
    fn weights_follow_x_counting() {
        assert_eq!(weighted_len("abc"), 3);
        assert_eq!(weighted_len("é"), 1);
        assert_eq!(weighted_len("🟢"), 2);
        assert_eq!(truncate_with_marker("🟢🟢🟢🟢", 7), "🟢🟢...");
    }

    #[test]
    fn tiny_limit_still_respected() {
        let out = format_signal_post(&signal(SignalType::Hold, "x"), 20);
        assert!(weighted_len(&out) <= 20);
        assert!(out.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn multi_word_asset_becomes_one_hashtag() {
        let s = TradingSignal::new("Shiba Inu", SignalType::Hold, 0.5, 0.0);
        assert!(format_signal_post(&s, 280).contains("#ShibaInu HOLD"));
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        let out = truncate_with_marker("ééééééééééé", 6);
        assert_eq!(out, "ééé...");
    }
}
