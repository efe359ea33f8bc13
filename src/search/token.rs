//! Navigation token codec - stateless pagination state / 导航令牌编解码
//!
//! Format: `1|<mode>|<field>...|<page>` where mode is `s`, `f` or `p`.
//! `\` and `|` inside fields are escaped with `\`, so any user text round-trips.

use super::schema::{Field, Page, SearchQuery};

pub const TOKEN_VERSION: &str = "1";
pub const DELIMITER: char = '|';
const ESCAPE: char = '\\';

/// Transport limit for a button payload (bytes) / 按钮负载长度上限（字节）
pub const MAX_TOKEN_LEN: usize = 64;

pub const PREVIOUS_LABEL: &str = "⬅️ Ant.";
pub const NEXT_LABEL: &str = "Sig. ➡️";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("unsupported token version")]
    Version,
    #[error("unknown mode tag: {0}")]
    Mode(String),
    #[error("wrong number of fields for mode")]
    Arity,
    #[error("unknown column role: {0}")]
    Field(String),
    #[error("invalid page index")]
    Page,
    #[error("dangling escape character")]
    Escape,
    #[error("empty search field")]
    EmptyField,
}

/// Query plus target page, carried by a pagination control / 查询与目标页
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationToken {
    pub query: SearchQuery,
    pub page_index: u32,
}

impl NavigationToken {
    pub fn new(query: SearchQuery, page_index: u32) -> Self {
        Self { query, page_index }
    }

    pub fn encode(&self) -> String {
        let mut parts: Vec<String> = vec![TOKEN_VERSION.to_string()];
        match &self.query {
            SearchQuery::SingleColumn { field, pattern } => {
                parts.push("s".to_string());
                parts.push(field.code().to_string());
                parts.push(escape_field(pattern));
            }
            SearchQuery::Combined { sex, cohort, address } => {
                parts.push("f".to_string());
                parts.push(escape_field(sex));
                parts.push(escape_field(cohort));
                parts.push(escape_field(address));
            }
            SearchQuery::PersonLookup { surname, given_name } => {
                parts.push("p".to_string());
                parts.push(escape_field(surname));
                parts.push(escape_field(given_name));
            }
        }
        parts.push(self.page_index.to_string());
        parts.join(&DELIMITER.to_string())
    }

    pub fn decode(token: &str) -> Result<Self, TokenError> {
        let parts = split_fields(token)?;
        let (version, rest) = parts.split_first().ok_or(TokenError::Version)?;
        if version != TOKEN_VERSION {
            return Err(TokenError::Version);
        }
        let (mode, rest) = rest.split_first().ok_or(TokenError::Arity)?;
        let (page, fields) = rest.split_last().ok_or(TokenError::Arity)?;
        let page_index: u32 = page.parse().map_err(|_| TokenError::Page)?;

        let query = match (mode.as_str(), fields) {
            ("s", [code, pattern]) => {
                let field = Field::from_code(code).ok_or_else(|| TokenError::Field(code.clone()))?;
                SearchQuery::single(field, pattern)
            }
            ("f", [sex, cohort, address]) => SearchQuery::combined(sex, cohort, address),
            ("p", [surname, given_name]) => SearchQuery::person(surname, given_name),
            ("s" | "f" | "p", _) => return Err(TokenError::Arity),
            (other, _) => return Err(TokenError::Mode(other.to_string())),
        }
        .ok_or(TokenError::EmptyField)?;

        Ok(Self { query, page_index })
    }
}

fn escape_field(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch == ESCAPE || ch == DELIMITER {
            out.push(ESCAPE);
        }
        out.push(ch);
    }
    out
}

/// Split on unescaped delimiters and unescape / 按未转义的分隔符切分
fn split_fields(token: &str) -> Result<Vec<String>, TokenError> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = token.chars();
    while let Some(ch) = chars.next() {
        match ch {
            ESCAPE => current.push(chars.next().ok_or(TokenError::Escape)?),
            DELIMITER => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    Ok(fields)
}

/// Pagination control, transport-neutral / 分页按钮
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavButton {
    pub label: &'static str,
    pub token: String,
}

/// Controls for a page: "previous" iff page > 0, "next" iff has_next / 生成分页按钮
///
/// Tokens over [`MAX_TOKEN_LEN`] cannot be carried by the transport; that button is dropped.
pub fn navigation(page: &Page) -> Vec<NavButton> {
    let mut buttons = Vec::new();
    let mut push = |label: &'static str, target: u32| {
        let token = NavigationToken::new(page.query.clone(), target).encode();
        if token.len() > MAX_TOKEN_LEN {
            tracing::warn!("Navigation token too long ({} bytes), button omitted", token.len());
        } else {
            buttons.push(NavButton { label, token });
        }
    };

    if page.has_previous() {
        push(PREVIOUS_LABEL, page.page_index - 1);
    }
    if page.has_next {
        push(NEXT_LABEL, page.page_index + 1);
    }
    buttons
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(query: SearchQuery, page: u32) {
        let token = NavigationToken::new(query, page);
        let decoded = NavigationToken::decode(&token.encode()).unwrap();
        assert_eq!(decoded, token);
    }

    fn page_at(page_index: u32, total_pages: u32) -> Page {
        Page {
            query: SearchQuery::person("Gomez", "Ana").unwrap(),
            records: Vec::new(),
            columns: Vec::new(),
            page_index,
            total_pages,
            total_count: 12,
            has_next: page_index + 1 < total_pages,
        }
    }

    #[test]
    fn test_round_trip_every_mode() {
        round_trip(SearchQuery::single(Field::Id, "30123456").unwrap(), 0);
        round_trip(SearchQuery::single(Field::Address, "Av. Mitre 1200").unwrap(), 7);
        round_trip(SearchQuery::combined("F", "1990", "San Martin").unwrap(), 2);
        round_trip(SearchQuery::person("Gomez", "Juan Carlos").unwrap(), 41);
    }

    #[test]
    fn test_round_trip_with_delimiter_in_value() {
        round_trip(SearchQuery::combined("F", "1990", "Calle 5 | Depto 3").unwrap(), 1);
        round_trip(SearchQuery::single(Field::Address, "a\\|b\\").unwrap(), 0);
        round_trip(SearchQuery::person("O|Brien", "\\").unwrap(), 3);
    }

    #[test]
    fn test_encoded_form() {
        let token = NavigationToken::new(SearchQuery::combined("F", "1990", "A|B").unwrap(), 2);
        assert_eq!(token.encode(), "1|f|F|1990|A\\|B|2");
        let token = NavigationToken::new(SearchQuery::single(Field::Surname, "Gomez").unwrap(), 0);
        assert_eq!(token.encode(), "1|s|a|Gomez|0");
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(NavigationToken::decode("simple|APELLIDO|Gomez|1"), Err(TokenError::Version));
        assert_eq!(NavigationToken::decode("1|x|a|b|1"), Err(TokenError::Mode("x".into())));
        assert_eq!(NavigationToken::decode("1|f|F|1990|1"), Err(TokenError::Arity));
        assert_eq!(NavigationToken::decode("1|s|z|Gomez|1"), Err(TokenError::Field("z".into())));
        assert_eq!(NavigationToken::decode("1|p|Gomez|Ana|-1"), Err(TokenError::Page));
        assert_eq!(NavigationToken::decode("1|p|Gomez|Ana\\"), Err(TokenError::Escape));
        assert_eq!(NavigationToken::decode("1|p|Gomez| |0"), Err(TokenError::EmptyField));
        assert_eq!(NavigationToken::decode("1"), Err(TokenError::Arity));
    }

    #[test]
    fn test_navigation_buttons() {
        let first = navigation(&page_at(0, 3));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].label, NEXT_LABEL);
        assert_eq!(NavigationToken::decode(&first[0].token).unwrap().page_index, 1);

        let middle = navigation(&page_at(1, 3));
        let labels: Vec<&str> = middle.iter().map(|b| b.label).collect();
        assert_eq!(labels, vec![PREVIOUS_LABEL, NEXT_LABEL]);

        let last = navigation(&page_at(2, 3));
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].label, PREVIOUS_LABEL);

        assert!(navigation(&page_at(0, 1)).is_empty());
    }

    #[test]
    fn test_oversized_token_dropped() {
        let mut page = page_at(0, 3);
        page.query = SearchQuery::single(Field::Address, &"x".repeat(80)).unwrap();
        assert!(navigation(&page).is_empty());
    }
}
