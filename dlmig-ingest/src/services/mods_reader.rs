//! Catalog lookup keys from the root unit's bibliographic description

use crate::error::{IngestError, IngestResult};
use crate::xml::Document;
use once_cell::sync::Lazy;
use regex::Regex;

/// Issue dates may carry ranges or prose; the first four digits are the year
static YEAR_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]{4}").expect("valid year regex"));

/// Shelf-mark signature and issue year of one title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootDescriptor {
    /// Physical location signature, raw (not yet percent-encoded)
    pub signature: String,
    pub year: String,
}

impl RootDescriptor {
    /// Read signature and year from the root document
    ///
    /// A missing shelf locator, issue date, or year yields
    /// [`IngestError::CatalogNotFound`]: the title cannot be matched and will
    /// be addressed through its fallback identity.
    pub fn read(document: &Document, root_id: &str) -> IngestResult<Self> {
        let signature = document
            .first_text("shelfLocator")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| IngestError::CatalogNotFound(format!("signature not found within {}", root_id)))?;

        let issued = document
            .first_text("dateIssued")
            .ok_or_else(|| IngestError::CatalogNotFound(format!("date issued not found within {}", root_id)))?;

        let year = YEAR_PATTERN
            .find(&issued)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                IngestError::CatalogNotFound(format!(
                    "date issued '{}' of {} contains no year",
                    issued, root_id
                ))
            })?;

        Ok(Self { signature, year })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mods(body: &str) -> Document {
        Document::parse(&format!(
            r#"<foxml:digitalObject xmlns:foxml="info:fedora/fedora-system:def/foxml#" xmlns:mods="http://www.loc.gov/mods/v3">
  <mods:mods>{}</mods:mods>
</foxml:digitalObject>"#,
            body
        ))
        .unwrap()
    }

    #[test]
    fn test_reads_signature_and_year() {
        let doc = mods(
            "<mods:location><mods:shelfLocator> 2-0212.345 </mods:shelfLocator></mods:location>\
             <mods:originInfo><mods:dateIssued>[ca. 1919]</mods:dateIssued></mods:originInfo>",
        );

        let descriptor = RootDescriptor::read(&doc, "root").unwrap();
        assert_eq!(descriptor.signature, "2-0212.345");
        assert_eq!(descriptor.year, "1919");
    }

    #[test]
    fn test_first_shelf_locator_wins() {
        let doc = mods(
            "<mods:shelfLocator>A 1</mods:shelfLocator><mods:shelfLocator>B 2</mods:shelfLocator>\
             <mods:dateIssued>1892-1893</mods:dateIssued>",
        );

        let descriptor = RootDescriptor::read(&doc, "root").unwrap();
        assert_eq!(descriptor.signature, "A 1");
        assert_eq!(descriptor.year, "1892");
    }

    #[test]
    fn test_missing_fields_are_not_found() {
        let no_signature = mods("<mods:dateIssued>1900</mods:dateIssued>");
        assert!(matches!(
            RootDescriptor::read(&no_signature, "root"),
            Err(IngestError::CatalogNotFound(_))
        ));

        let no_year = mods("<mods:shelfLocator>A 1</mods:shelfLocator><mods:dateIssued>n.d.</mods:dateIssued>");
        assert!(matches!(
            RootDescriptor::read(&no_year, "root"),
            Err(IngestError::CatalogNotFound(_))
        ));
    }
}
