use std::borrow::Cow;
use std::collections::BTreeMap;

use super::result::Detection;

const DEFAULT_UNKNOWN_TEMPLATE: &str = "class {id}";

/// Maps class ids to display names.
///
/// Lookups never fail: ids missing from the table render through the
/// unknown template, `"class {id}"` unless replaced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassTable {
    names: BTreeMap<u32, String>,
    unknown: String,
}

impl ClassTable {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(|(id, name)| (id, name.into())).collect(),
            unknown: DEFAULT_UNKNOWN_TEMPLATE.to_string(),
        }
    }

    /// Replace the template for unknown ids; `{id}` expands to the class id.
    pub fn with_unknown_template(mut self, template: impl Into<String>) -> Self {
        self.unknown = template.into();
        self
    }

    pub fn name(&self, class_id: u32) -> Cow<'_, str> {
        match self.names.get(&class_id) {
            Some(name) => Cow::Borrowed(name.as_str()),
            None => Cow::Owned(self.unknown.replace("{id}", &class_id.to_string())),
        }
    }

    /// Overlay label text: `"{name}: {confidence}"` with two decimals.
    pub fn label(&self, detection: &Detection) -> String {
        format!(
            "{}: {:.2}",
            self.name(detection.class_id),
            detection.confidence
        )
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::new([(0, "anomaly"), (1, "normal")])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    #[test]
    fn default_table_resolves_both_classes() {
        let table = ClassTable::default();
        assert_eq!(table.name(0), "anomaly");
        assert_eq!(table.name(1), "normal");
    }

    #[test]
    fn unknown_id_gets_placeholder() {
        let table = ClassTable::default();
        assert_eq!(table.name(7), "class 7");
    }

    #[test]
    fn unknown_template_is_configurable() {
        let table = ClassTable::default().with_unknown_template("未知 #{id}");
        assert_eq!(table.name(0), "anomaly");
        assert_eq!(table.name(12), "未知 #12");

        let fixed = ClassTable::default().with_unknown_template("other");
        assert_eq!(fixed.name(5), "other");
    }

    #[test]
    fn label_uses_two_decimals() {
        let table = ClassTable::default();
        let det = Detection::new(BoundingBox::new(1, 2, 3, 4), 0.8731, 0);
        assert_eq!(table.label(&det), "anomaly: 0.87");

        let det = Detection::new(BoundingBox::new(1, 2, 3, 4), 1.0, 9);
        assert_eq!(table.label(&det), "class 9: 1.00");
    }

    #[test]
    fn non_ascii_names_are_kept() {
        let table = ClassTable::new([(0, "异常"), (1, "正常")]);
        let det = Detection::new(BoundingBox::new(0, 0, 1, 1), 0.5, 1);
        assert_eq!(table.label(&det), "正常: 0.50");
    }
}
