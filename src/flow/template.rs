use std::collections::HashMap;

/// FlowSet id carrying template definitions.
pub const TEMPLATE_FLOWSET: u16 = 0;
/// FlowSet id carrying options template definitions.
pub const OPTIONS_FLOWSET: u16 = 1;
/// Lowest id an exporter may assign to a template.
pub const MIN_TEMPLATE_ID: u16 = 256;

/// One field of a template: IANA field type plus the on-wire byte width
/// this exporter chose for it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FieldSpec {
    pub kind:   u16,
    pub length: u16,
}

/// An exporter-declared record layout. Immutable once installed; a later
/// definition with the same id replaces it wholesale.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Template {
    fields: Vec<FieldSpec>,
    width:  usize,
}

impl Template {
    /// Rejects empty field lists and zero-width records, which could not
    /// bound a data FlowSet walk.
    pub fn new(fields: Vec<FieldSpec>) -> Option<Self> {
        let width = fields.iter().map(|f| f.length as usize).sum();
        match width {
            0 => None,
            _ => Some(Self { fields, width }),
        }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

/// Template dictionary of a single probe. Never shared: templates are
/// scoped to the exporter session that announced them.
#[derive(Debug, Default)]
pub struct TemplateTable {
    map: HashMap<u16, Template>,
}

impl TemplateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: u16, template: Template) {
        self.map.insert(id, template);
    }

    pub fn get(&self, id: u16) -> Option<&Template> {
        self.map.get(&id)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn zero_width_rejected() {
        assert!(Template::new(Vec::new()).is_none());
        assert!(Template::new(vec![FieldSpec { kind: 8, length: 0 }]).is_none());
    }

    #[test]
    fn replace_overwrites() {
        let mut table = TemplateTable::new();
        let first  = Template::new(vec![FieldSpec { kind: 8, length: 4 }]).unwrap();
        let second = Template::new(vec![FieldSpec { kind: 12, length: 4 }]).unwrap();

        table.insert(256, first);
        table.insert(256, second.clone());

        assert_eq!(table.len(), 1);
        assert_eq!(table.get(256), Some(&second));
    }
}
