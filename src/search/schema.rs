//! Search query and result page definitions / 搜索查询与结果页定义

use serde::Serialize;

use crate::config::ColumnMap;
use crate::models::Record;
use crate::store::Filter;

/// Column role targeted by a single-column search / 单列搜索的目标列角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Id,
    Surname,
    GivenName,
    Address,
}

impl Field {
    /// One-letter code used inside navigation tokens / 导航令牌中的单字母代码
    pub fn code(self) -> char {
        match self {
            Field::Id => 'i',
            Field::Surname => 'a',
            Field::GivenName => 'n',
            Field::Address => 'd',
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "i" => Some(Field::Id),
            "a" => Some(Field::Surname),
            "n" => Some(Field::GivenName),
            "d" => Some(Field::Address),
            _ => None,
        }
    }

    /// Physical column for this role / 该角色对应的物理列
    pub fn column(self, columns: &ColumnMap) -> &str {
        match self {
            Field::Id => &columns.id,
            Field::Surname => &columns.surname,
            Field::GivenName => &columns.given_name,
            Field::Address => &columns.address,
        }
    }
}

/// The three search shapes / 三种搜索方式
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SearchQuery {
    /// Substring match on one column / 单列子串匹配
    SingleColumn { field: Field, pattern: String },
    /// Exact sex + exact cohort + address substring / 性别、届别精确匹配 + 地址子串匹配
    Combined { sex: String, cohort: String, address: String },
    /// Substring match on surname and given name jointly / 姓与名同时子串匹配
    PersonLookup { surname: String, given_name: String },
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl SearchQuery {
    /// Returns `None` when the pattern is blank / 模式为空时返回 None
    pub fn single(field: Field, pattern: &str) -> Option<Self> {
        Some(SearchQuery::SingleColumn {
            field,
            pattern: non_empty(pattern)?,
        })
    }

    pub fn combined(sex: &str, cohort: &str, address: &str) -> Option<Self> {
        Some(SearchQuery::Combined {
            sex: non_empty(sex)?,
            cohort: non_empty(cohort)?,
            address: non_empty(address)?,
        })
    }

    pub fn person(surname: &str, given_name: &str) -> Option<Self> {
        Some(SearchQuery::PersonLookup {
            surname: non_empty(surname)?,
            given_name: non_empty(given_name)?,
        })
    }

    /// Filter predicate against the configured schema / 根据列映射生成过滤条件
    pub fn filter(&self, columns: &ColumnMap) -> Filter {
        match self {
            SearchQuery::SingleColumn { field, pattern } => {
                Filter::new().contains(field.column(columns), pattern)
            }
            SearchQuery::Combined { sex, cohort, address } => Filter::new()
                .equals(&columns.sex, sex)
                .equals(&columns.cohort, cohort)
                .contains(&columns.address, address),
            SearchQuery::PersonLookup { surname, given_name } => Filter::new()
                .contains(&columns.surname, surname)
                .contains(&columns.given_name, given_name),
        }
    }
}

/// One page of results / 一页搜索结果
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub query: SearchQuery,
    pub records: Vec<Record>,
    pub columns: Vec<String>,
    /// 0-based / 从0开始
    pub page_index: u32,
    pub total_pages: u32,
    pub total_count: u64,
    pub has_next: bool,
}

impl Page {
    pub fn has_previous(&self) -> bool {
        self.page_index > 0
    }
}
