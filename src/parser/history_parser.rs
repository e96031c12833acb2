// Market listing page parsing: the embedded price history literal
use crate::analyzer::series::{Sample, TimeSeries};
use crate::model::ParserError;
use crate::utils::extract_between;
use chrono::{NaiveDate, TimeZone, Utc};
use scraper::{Html, Selector};

pub const HISTORY_PREFIX: &str = "var line1=";
pub const HISTORY_SUFFIX: &str = ";";

pub trait Parser {
    fn parse(&self, text: &str) -> Result<TimeSeries, ParserError>;
}

/// Reads the `[[date, price, count], ...]` literal of a listing page.
///
/// The literal is decoded as JSON; nothing in the page is ever evaluated.
#[derive(Debug, Default)]
pub struct HistoryParser;

impl HistoryParser {
    pub fn new() -> Self {
        Self
    }

    /// Finds the literal, preferring inline scripts over the raw text.
    fn locate(&self, text: &str) -> Result<String, ParserError> {
        let document = Html::parse_document(text);
        let script_selector =
            Selector::parse("script").map_err(|e| ParserError::HtmlParseError(e.to_string()))?;

        for script in document.select(&script_selector) {
            let body = script.text().collect::<String>();
            if let Some(literal) = extract_between(&body, HISTORY_PREFIX, HISTORY_SUFFIX) {
                return Ok(literal.to_string());
            }
        }

        extract_between(text, HISTORY_PREFIX, HISTORY_SUFFIX)
            .map(str::to_string)
            .ok_or_else(|| ParserError::MissingMarkers {
                prefix: HISTORY_PREFIX.into(),
                suffix: HISTORY_SUFFIX.into(),
            })
    }
}

impl Parser for HistoryParser {
    fn parse(&self, text: &str) -> Result<TimeSeries, ParserError> {
        let literal = self.locate(text)?;
        let rows: Vec<(String, f64, String)> = serde_json::from_str(&literal)?;
        if rows.is_empty() {
            return Err(ParserError::Empty);
        }

        let samples = rows
            .into_iter()
            .map(|(date, price, count)| {
                if !price.is_finite() {
                    return Err(ParserError::InvalidNumber(price.to_string()));
                }
                Ok(Sample {
                    timestamp: parse_market_date(&date)?,
                    price,
                    count: count
                        .trim()
                        .parse()
                        .map_err(|_| ParserError::InvalidNumber(count.clone()))?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        TimeSeries::new(samples)
    }
}

/// Parses dates like `"Mar 01 2018 01: +0"` (month, day, year, hour, UTC).
pub fn parse_market_date(text: &str) -> Result<chrono::DateTime<Utc>, ParserError> {
    let invalid = || ParserError::InvalidDate(text.to_string());

    let (rest, offset) = text.rsplit_once(' ').ok_or_else(invalid)?;
    if offset != "+0" {
        return Err(invalid());
    }
    let (day, hour) = rest
        .strip_suffix(':')
        .and_then(|r| r.rsplit_once(' '))
        .ok_or_else(invalid)?;

    let hour: u32 = match hour.len() {
        1 | 2 if hour.bytes().all(|b| b.is_ascii_digit()) => hour.parse().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };
    let date = NaiveDate::parse_from_str(day, "%b %d %Y").map_err(|_| invalid())?;
    let naive = date.and_hms_opt(hour, 0, 0).ok_or_else(invalid)?;
    Ok(Utc.from_utc_datetime(&naive))
}
