use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static CLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[%clk\s+(\d+):(\d{1,2}):(\d{1,2}(?:\.\d+)?)\]").expect("valid clock regex")
});

static EVAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[%eval\s+(?:#([+-]?\d+)|([+-]?(?:\d+(?:\.\d*)?|\.\d+)))(?:,\d+)?\]")
        .expect("valid eval regex")
});

static ARROWS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[%(cal|csl)\s+([^\]]*)\]").expect("valid arrows regex"));

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Eval {
    /// Score in pawns from White's point of view.
    Pawns(f32),
    /// Mate in N moves; negative when Black mates.
    Mate(i32),
}

/// Coloured square (`from == to`) or arrow, as `(colour, from, to)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mark {
    pub color: char,
    pub from: String,
    pub to: String,
}

pub fn clock(comment: &str) -> Option<Duration> {
    let caps = CLOCK_RE.captures(comment)?;
    let hours: u64 = caps[1].parse().ok()?;
    let minutes: u64 = caps[2].parse().ok()?;
    let seconds: f64 = caps[3].parse().ok()?;
    let secs = hours.checked_mul(3600)?.checked_add(minutes * 60)?;
    Duration::from_secs(secs).checked_add(Duration::from_secs_f64(seconds))
}

pub fn eval(comment: &str) -> Option<Eval> {
    let caps = EVAL_RE.captures(comment)?;
    if let Some(mate) = caps.get(1) {
        return mate.as_str().parse().ok().map(Eval::Mate);
    }
    caps.get(2)?.as_str().parse().ok().map(Eval::Pawns)
}

/// Arrows from `[%cal]` markup.
pub fn arrows(comment: &str) -> Vec<Mark> {
    marks(comment, "cal")
}

/// Highlighted squares from `[%csl]` markup.
pub fn highlights(comment: &str) -> Vec<Mark> {
    marks(comment, "csl")
}

fn marks(comment: &str, kind: &str) -> Vec<Mark> {
    ARROWS_RE
        .captures_iter(comment)
        .filter(|caps| &caps[1] == kind)
        .flat_map(|caps| {
            caps[2]
                .split(',')
                .filter_map(parse_mark)
                .collect::<Vec<_>>()
        })
        .collect()
}

fn parse_mark(raw: &str) -> Option<Mark> {
    let raw = raw.trim();
    let mut chars = raw.chars();
    let color = chars.next()?;
    let squares: String = chars.collect();
    match squares.len() {
        2 => Some(Mark {
            color,
            from: squares.clone(),
            to: squares,
        }),
        4 => Some(Mark {
            color,
            from: squares[..2].to_string(),
            to: squares[2..].to_string(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_parsing() {
        assert_eq!(clock("[%clk 1:30:43]"), Some(Duration::from_secs(5443)));
        assert_eq!(clock("[%eval 0.1] [%clk 0:00:05]"), Some(Duration::from_secs(5)));
        assert_eq!(clock("no clock here"), None);
    }

    #[test]
    fn test_huge_clock_is_rejected() {
        assert_eq!(clock("[%clk 10000000000000000:00:00]"), None);
        assert_eq!(clock("[%clk 99999999999999999999:00:00]"), None);
        assert_eq!(
            clock("[%clk 1000000:00:00]"),
            Some(Duration::from_secs(3_600_000_000))
        );
    }

    #[test]
    fn test_eval_pawns_and_mate() {
        assert_eq!(eval("[%eval 0.25]"), Some(Eval::Pawns(0.25)));
        assert_eq!(eval("[%eval -1.5,20]"), Some(Eval::Pawns(-1.5)));
        assert_eq!(eval("[%eval #-3]"), Some(Eval::Mate(-3)));
        assert_eq!(eval("{ plain }"), None);
    }

    #[test]
    fn test_arrows_and_highlights() {
        let comment = "[%csl Gd4][%cal Gc5d4,Re2e4]";
        assert_eq!(
            highlights(comment),
            vec![Mark {
                color: 'G',
                from: "d4".into(),
                to: "d4".into()
            }]
        );
        let arrows = arrows(comment);
        assert_eq!(arrows.len(), 2);
        assert_eq!(arrows[1].from, "e2");
        assert_eq!(arrows[1].to, "e4");
        assert_eq!(arrows[1].color, 'R');
    }
}
