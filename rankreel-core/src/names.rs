use csv::ReaderBuilder;
use std::collections::HashMap;

/// Display names for entity ids, falling back to the id itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    names: HashMap<String, String>,
}

impl Directory {
    /// Parse `entity_id,name` rows (with a header line).
    pub fn parse_csv(data: &str) -> Result<Directory, csv::Error> {
        let mut names = HashMap::new();
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(data.as_bytes());
        for result in rdr.records() {
            let record = result?;
            if let (Some(id), Some(name)) = (record.get(0), record.get(1)) {
                if !id.is_empty() && !name.is_empty() {
                    names.insert(id.to_string(), name.to_string());
                }
            }
        }
        Ok(Directory { names })
    }

    pub fn name_of<'a>(&'a self, entity_id: &'a str) -> &'a str {
        self.names
            .get(entity_id)
            .map(String::as_str)
            .unwrap_or(entity_id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::Directory;

    const NAMES: &str = r#"entity_id,name
https://sp.example.org, Example Service
https://idp.example.edu,Example University
https://empty.example.org,
"#;

    #[test]
    fn test_parse_directory() {
        let directory = Directory::parse_csv(NAMES).unwrap();
        assert_eq!(directory.len(), 2);
        assert_eq!(directory.name_of("https://sp.example.org"), "Example Service");
        assert_eq!(directory.name_of("https://idp.example.edu"), "Example University");
    }

    #[test]
    fn test_unknown_ids_fall_back_to_the_id() {
        let directory = Directory::parse_csv(NAMES).unwrap();
        assert_eq!(directory.name_of("https://empty.example.org"), "https://empty.example.org");
        assert_eq!(Directory::default().name_of("x"), "x");
    }
}
