//! Token grammar for loosely formatted transfusion and platelet records.
//!
//! ```text
//! date        := MM "/" DD "/" YY
//! clock_time  := H[H] ":" MM | HHMM
//! transfusion := date WS clock_time WS? "to" WS? clock_time
//! label       := "PLT" | "Platelets"
//! qualifier   := "(" letters-and-spaces ")"
//! count       := date WS clock_time NEWLINE [BLANK-LINE] label [WS? qualifier] WS? ":" WS? integer
//! ```
//!
//! `WS` never crosses a line break, so a transfusion record lives on a single line and a
//! count record spans at most one blank line between timestamp and value.

use once_cell::sync::Lazy;
use regex::Regex;

/// `MM/DD/YY`. Calendar validity is checked when converting, not here.
pub const DATE: &str = r"\d{2}/\d{2}/\d{2}";

/// Colon-delimited (`08:30`, `8:30`) or compact (`0830`) clock time.
pub const CLOCK_TIME: &str = r"[0-2]?\d:[0-5]\d|[0-2]\d[0-5]\d";

pub const LABEL: &str = r"PLT|Platelets";

pub const QUALIFIER: &str = r"[A-Za-z][A-Za-z ]*";

pub const INTEGER: &str = r"\d+";

const INLINE_SPACE: &str = r"[ \t]";

const LINE_BREAK: &str = r"\r?\n";

pub static TRANSFUSION: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(
        r"\b(?P<date>{DATE}){INLINE_SPACE}+(?P<start>{CLOCK_TIME}){INLINE_SPACE}*(?i:to){INLINE_SPACE}*(?P<end>{CLOCK_TIME})"
    );
    Regex::new(&pattern).expect("transfusion grammar is a valid pattern")
});

pub static PLATELET_COUNT: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(
        concat!(
            r"\b(?P<date>{date}){ws}+(?P<time>{time}){ws}*{nl}",
            r"(?:{ws}*{nl})?{ws}*",
            r"(?P<label>{label})(?:{ws}*\((?P<qualifier>{qualifier})\))?",
            r"{ws}*:{ws}*(?P<value>{integer})",
        ),
        date = DATE,
        time = CLOCK_TIME,
        label = LABEL,
        qualifier = QUALIFIER,
        integer = INTEGER,
        ws = INLINE_SPACE,
        nl = LINE_BREAK,
    );
    Regex::new(&pattern).expect("platelet count grammar is a valid pattern")
});
