//! Result formatter - renders a page as a plain-text chat message / 结果格式化

use crate::config::ColumnMap;

use super::schema::{Page, SearchQuery};

/// Separator printed before every record / 记录分隔线
pub const DIVIDER: &str = "➖➖➖➖➖";
/// Appended when the rendered page exceeds the message limit / 超长截断提示
pub const TRUNCATION_NOTICE: &str = "\n\n✂️ Mensaje recortado (demasiado largo).";

/// Message length as counted by the transport (UTF-16 code units) / 按 UTF-16 计算长度
pub fn message_len(text: &str) -> usize {
    text.encode_utf16().count()
}

pub struct Formatter {
    columns: ColumnMap,
    max_len: usize,
}

impl Formatter {
    pub fn new(columns: ColumnMap, max_len: usize) -> Self {
        Self { columns, max_len }
    }

    /// Header line with search terms and "page X of Y" / 标题行
    pub fn header(&self, query: &SearchQuery, page_index: u32, total_pages: u32) -> String {
        let position = format!("(Pág {}/{})", page_index.saturating_add(1), total_pages);
        match query {
            SearchQuery::SingleColumn { field, pattern } => {
                format!("🔎 '{}' en {} {}:", pattern, field.column(&self.columns), position)
            }
            SearchQuery::Combined { sex, cohort, address } => {
                format!("🎯 Finder {} / {} / '{}' {}:", sex, cohort, address, position)
            }
            SearchQuery::PersonLookup { surname, given_name } => {
                format!("👤 {}, {} {}:", surname, given_name, position)
            }
        }
    }

    /// Mode-specific "nothing found" reply / 无结果提示
    pub fn not_found(&self, query: &SearchQuery) -> String {
        match query {
            SearchQuery::SingleColumn { field, pattern } => {
                format!("❌ Nada en {} para '{}'.", field.column(&self.columns), pattern)
            }
            SearchQuery::Combined { sex, cohort, address } => format!(
                "❌ Sin resultados Finder para {} / {} / '{}'.",
                sex, cohort, address
            ),
            SearchQuery::PersonLookup { surname, given_name } => format!(
                "❌ Nadie con Apellido '{}' y Nombre '{}'.",
                surname, given_name
            ),
        }
    }

    /// Render fully, then hard-truncate to the message limit / 完整渲染后再截断
    pub fn render_page(&self, page: &Page) -> String {
        let mut message = self.header(&page.query, page.page_index, page.total_pages);
        message.push('\n');

        if page.records.is_empty() {
            message.push_str("\nNo hay más resultados en esta página.\n");
        }

        for record in &page.records {
            message.push('\n');
            message.push_str(DIVIDER);
            message.push('\n');
            for (name, value) in record.visible_fields() {
                message.push_str(&format!("🔹 {}: {}\n", name, value));
            }
        }

        self.truncate(message)
    }

    fn truncate(&self, text: String) -> String {
        if message_len(&text) <= self.max_len {
            return text;
        }

        let budget = self.max_len.saturating_sub(message_len(TRUNCATION_NOTICE));
        let mut used = 0;
        let mut end = 0;
        for (idx, ch) in text.char_indices() {
            let width = ch.len_utf16();
            if used + width > budget {
                break;
            }
            used += width;
            end = idx + ch.len_utf8();
        }

        let mut out = text[..end].to_string();
        out.push_str(TRUNCATION_NOTICE);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldValue, Record};
    use crate::search::schema::Field;

    fn record(id: i64, surname: &str) -> Record {
        Record::new(vec![
            ("id".into(), FieldValue::Integer(id)),
            ("APELLIDO".into(), FieldValue::Text(surname.into())),
            ("TELEFONO".into(), FieldValue::Text("nan".into())),
            ("EMAIL".into(), FieldValue::Text("None".into())),
            ("OBS".into(), FieldValue::Null),
            ("NOTA".into(), FieldValue::Text(String::new())),
        ])
    }

    fn page(records: Vec<Record>, page_index: u32, total_pages: u32) -> Page {
        Page {
            query: SearchQuery::single(Field::Surname, "Gomez").unwrap(),
            records,
            columns: Vec::new(),
            page_index,
            total_pages,
            total_count: 12,
            has_next: page_index + 1 < total_pages,
        }
    }

    #[test]
    fn test_render_skips_null_like_fields() {
        let formatter = Formatter::new(ColumnMap::default(), 4096);
        let text = formatter.render_page(&page(vec![record(1, "Gomez"), record(2, "Gómez")], 0, 3));

        assert!(text.starts_with("🔎 'Gomez' en APELLIDO (Pág 1/3):"));
        assert_eq!(text.matches(DIVIDER).count(), 2);
        assert!(text.contains("🔹 id: 1\n"));
        assert!(text.contains("🔹 APELLIDO: Gómez\n"));
        for hidden in ["TELEFONO", "EMAIL", "OBS", "NOTA"] {
            assert!(!text.contains(hidden));
        }
    }

    #[test]
    fn test_headers_per_mode() {
        let formatter = Formatter::new(ColumnMap::default(), 4096);
        let combined = SearchQuery::combined("F", "1990", "Mitre").unwrap();
        assert_eq!(formatter.header(&combined, 1, 4), "🎯 Finder F / 1990 / 'Mitre' (Pág 2/4):");
        let person = SearchQuery::person("Gomez", "Juan Carlos").unwrap();
        assert_eq!(formatter.header(&person, 0, 1), "👤 Gomez, Juan Carlos (Pág 1/1):");
        assert_eq!(
            formatter.not_found(&person),
            "❌ Nadie con Apellido 'Gomez' y Nombre 'Juan Carlos'."
        );
    }

    #[test]
    fn test_page_past_end() {
        let formatter = Formatter::new(ColumnMap::default(), 4096);
        let text = formatter.render_page(&page(Vec::new(), 3, 3));
        assert!(text.contains("(Pág 4/3)"));
        assert!(!text.contains(DIVIDER));
    }

    #[test]
    fn test_truncation() {
        let formatter = Formatter::new(ColumnMap::default(), 200);
        let records = (0..20).map(|i| record(i, "Gomez con un apellido muy largo")).collect();
        let text = formatter.render_page(&page(records, 0, 4));

        assert!(message_len(&text) <= 200);
        assert!(text.ends_with(TRUNCATION_NOTICE));
    }

    #[test]
    fn test_short_message_untouched() {
        let formatter = Formatter::new(ColumnMap::default(), 4096);
        let text = formatter.render_page(&page(vec![record(1, "Gomez")], 0, 1));
        assert!(!text.contains(TRUNCATION_NOTICE));
    }
}
