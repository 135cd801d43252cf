// Descriptive statistics over classified output. Nothing here feeds back
// into classification.

pub mod keywords;
