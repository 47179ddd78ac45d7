use time::format_description::well_known::Rfc3339;
use time::macros::{format_description, offset};
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
use url::Url;

/// Business timezone (America/Sao_Paulo, no daylight saving since 2019).
pub(crate) const BUSINESS_OFFSET: UtcOffset = offset!(-3);

pub(crate) const PAGE_BASE_URL: &str = "https://4.events/pt-br";

const CARD_DOMAINS: &[&str] = &["pipe.run", "app.pipe.run", "4.works", "app.4.works"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum ValidationError {
    #[error("O nome da tarefa não pode estar vazio!")]
    EmptyTaskName,
    #[error("Os detalhes da tarefa não podem estar vazios!")]
    EmptyTaskDetails,
    #[error("Campo ausente `{0}`")]
    MissingField(&'static str),
    #[error("Formato de data inválido. Use DD/MM/AAAA (ex: 25/12/2024)")]
    InvalidDateFormat,
    #[error("Mês inválido (1-12)")]
    InvalidMonth,
    #[error("Dia inválido (1-31)")]
    InvalidDay,
    #[error("Data inválida. Verifique se o dia existe no mês informado")]
    InvalidDate,
    #[error("A data não pode ser no passado")]
    PastDeadline,
    #[error("Não é possível consultar dados de datas futuras")]
    FutureQueryDate,
    #[error("URL deve ser do sistema Pipe.run ou 4.works")]
    CardUrlDomain,
    #[error("URL inválida. Verifique o formato da URL")]
    InvalidUrl,
}

/// A calendar date accepted from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ValidDate {
    /// `DD/MM/YYYY`.
    pub(crate) formatted: String,
    pub(crate) date: Date,
    /// Midnight of `date` in the business timezone, as RFC 3339 UTC.
    pub(crate) iso: String,
}

impl ValidDate {
    pub(crate) fn new(date: Date) -> Self {
        let iso = PrimitiveDateTime::new(date, Time::MIDNIGHT)
            .assume_offset(BUSINESS_OFFSET)
            .to_offset(UtcOffset::UTC)
            .format(&Rfc3339)
            .unwrap_or_default();
        Self {
            formatted: format!("{:02}/{:02}/{}", date.day(), u8::from(date.month()), date.year()),
            date,
            iso,
        }
    }
}

/// Today in the business timezone.
pub(crate) fn today() -> Date {
    OffsetDateTime::now_utc().to_offset(BUSINESS_OFFSET).date()
}

/// Current wall-clock time in the business timezone, `DD/MM/YYYY, HH:MM`.
pub(crate) fn now_formatted() -> String {
    OffsetDateTime::now_utc()
        .to_offset(BUSINESS_OFFSET)
        .format(format_description!("[day]/[month]/[year], [hour]:[minute]"))
        .unwrap_or_default()
}

fn digits(part: &str, min: usize, max: usize) -> Result<u32, ValidationError> {
    if !(min..=max).contains(&part.len()) {
        return Err(ValidationError::InvalidDateFormat);
    }
    part.parse().map_err(|_| ValidationError::InvalidDateFormat)
}

/// Parses `D/M/YY`, `DD/MM/YYYY` and the mixes in between.
///
/// Anything other than digits and `/` is dropped first. Two-digit years land
/// in the century of `today`, or the next one when that would put them more
/// than 50 years back.
pub(crate) fn parse_date(input: &str, today: Date) -> Result<ValidDate, ValidationError> {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '/')
        .collect();
    let parts: Vec<&str> = cleaned.split('/').collect();
    let [day, month, year] = parts.as_slice() else {
        return Err(ValidationError::InvalidDateFormat);
    };

    let day = digits(day, 1, 2)?;
    let month = digits(month, 1, 2)?;
    let mut year = i32::try_from(digits(year, 2, 4)?).map_err(|_| ValidationError::InvalidDateFormat)?;

    if year < 100 {
        let current = today.year();
        year += current / 100 * 100;
        if year < current - 50 {
            year += 100;
        }
    }
    if !(1..=12).contains(&month) {
        return Err(ValidationError::InvalidMonth);
    }
    if !(1..=31).contains(&day) {
        return Err(ValidationError::InvalidDay);
    }

    let month = u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .ok_or(ValidationError::InvalidMonth)?;
    let day = u8::try_from(day).map_err(|_| ValidationError::InvalidDay)?;
    let date = Date::from_calendar_date(year, month, day).map_err(|_| ValidationError::InvalidDate)?;

    Ok(ValidDate::new(date))
}

/// Deadline for a new marketing task: any valid date from today on.
pub(crate) fn parse_deadline(input: &str, today: Date) -> Result<ValidDate, ValidationError> {
    let deadline = parse_date(input, today)?;
    if deadline.date < today {
        return Err(ValidationError::PastDeadline);
    }
    Ok(deadline)
}

/// Reference date for an analytics query: any valid date up to today.
pub(crate) fn parse_query_date(input: &str, today: Date) -> Result<ValidDate, ValidationError> {
    let date = parse_date(input, today)?;
    if date.date > today {
        return Err(ValidationError::FutureQueryDate);
    }
    Ok(date)
}

pub(crate) fn non_empty(value: &str, error: ValidationError) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(error);
    }
    Ok(trimmed.to_string())
}

/// Accepts only card links hosted on the CRM domains.
pub(crate) fn validate_card_url(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    let url = Url::parse(trimmed).map_err(|_| ValidationError::InvalidUrl)?;
    let host = url
        .host_str()
        .ok_or(ValidationError::InvalidUrl)?
        .to_ascii_lowercase();
    if !CARD_DOMAINS.iter().any(|domain| host.contains(domain)) {
        return Err(ValidationError::CardUrlDomain);
    }
    Ok(trimmed.to_string())
}

/// Full landing page URL for a path suffix such as `/evento-x`.
pub(crate) fn build_page_url(suffix: &str) -> String {
    let suffix = suffix.trim();
    let suffix = suffix.strip_prefix('/').unwrap_or(suffix);
    format!("{PAGE_BASE_URL}/{suffix}")
}

pub(crate) fn days_between(a: Date, b: Date) -> i64 {
    (b - a).whole_days().abs()
}
