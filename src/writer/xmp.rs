//! XMP metadata packet writer.
//!
//! Generates the XML metadata packet attached at the catalog level
//! (/Metadata) for re-encrypted output. See ISO 32000-1:2008, Section
//! 14.3.2.

/// XMP namespace URIs
const NS_X: &str = "adobe:ns:meta/";
const NS_RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
const NS_DC: &str = "http://purl.org/dc/elements/1.1/";
const NS_XMP: &str = "http://ns.adobe.com/xap/1.0/";
const NS_PDF: &str = "http://ns.adobe.com/pdf/1.3/";

/// XMP packet builder.
#[derive(Debug, Default)]
pub struct XmpWriter {
    title: Option<String>,
    creators: Vec<String>,
    creator_tool: Option<String>,
    create_date: Option<String>,
    modify_date: Option<String>,
    producer: Option<String>,
    pdf_version: Option<String>,
}

impl XmpWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the document title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Add a creator/author.
    pub fn creator(mut self, creator: impl Into<String>) -> Self {
        self.creators.push(creator.into());
        self
    }

    /// Set the creator tool.
    pub fn creator_tool(mut self, tool: impl Into<String>) -> Self {
        self.creator_tool = Some(tool.into());
        self
    }

    /// Set the creation date (ISO 8601).
    pub fn create_date(mut self, date: impl Into<String>) -> Self {
        self.create_date = Some(date.into());
        self
    }

    /// Set the modification date (ISO 8601).
    pub fn modify_date(mut self, date: impl Into<String>) -> Self {
        self.modify_date = Some(date.into());
        self
    }

    /// Set the PDF producer.
    pub fn producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = Some(producer.into());
        self
    }

    /// Set the source document's PDF format version.
    pub fn pdf_version(mut self, version: impl Into<String>) -> Self {
        self.pdf_version = Some(version.into());
        self
    }

    /// Build the XMP packet bytes.
    pub fn build_bytes(self) -> Vec<u8> {
        self.to_xml().into_bytes()
    }

    fn to_xml(&self) -> String {
        let mut xml = String::new();

        xml.push_str(r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>"#);
        xml.push('\n');
        xml.push_str(&format!(r#"<x:xmpmeta xmlns:x="{}">"#, NS_X));
        xml.push('\n');
        xml.push_str(&format!(r#"  <rdf:RDF xmlns:rdf="{}">"#, NS_RDF));
        xml.push('\n');

        xml.push_str("    <rdf:Description rdf:about=\"\"\n");
        xml.push_str(&format!("        xmlns:dc=\"{}\"\n", NS_DC));
        xml.push_str(&format!("        xmlns:xmp=\"{}\"\n", NS_XMP));
        xml.push_str(&format!("        xmlns:pdf=\"{}\">\n", NS_PDF));

        if let Some(title) = &self.title {
            xml.push_str("      <dc:title>\n");
            xml.push_str("        <rdf:Alt>\n");
            xml.push_str(&format!(
                "          <rdf:li xml:lang=\"x-default\">{}</rdf:li>\n",
                escape_xml(title)
            ));
            xml.push_str("        </rdf:Alt>\n");
            xml.push_str("      </dc:title>\n");
        }

        if !self.creators.is_empty() {
            xml.push_str("      <dc:creator>\n");
            xml.push_str("        <rdf:Seq>\n");
            for creator in &self.creators {
                xml.push_str(&format!("          <rdf:li>{}</rdf:li>\n", escape_xml(creator)));
            }
            xml.push_str("        </rdf:Seq>\n");
            xml.push_str("      </dc:creator>\n");
        }

        if let Some(tool) = &self.creator_tool {
            xml.push_str(&format!(
                "      <xmp:CreatorTool>{}</xmp:CreatorTool>\n",
                escape_xml(tool)
            ));
        }

        if let Some(date) = &self.create_date {
            xml.push_str(&format!("      <xmp:CreateDate>{}</xmp:CreateDate>\n", escape_xml(date)));
        }

        if let Some(date) = &self.modify_date {
            xml.push_str(&format!("      <xmp:ModifyDate>{}</xmp:ModifyDate>\n", escape_xml(date)));
        }

        if let Some(producer) = &self.producer {
            xml.push_str(&format!("      <pdf:Producer>{}</pdf:Producer>\n", escape_xml(producer)));
        }

        if let Some(version) = &self.pdf_version {
            xml.push_str(&format!(
                "      <pdf:PDFVersion>{}</pdf:PDFVersion>\n",
                escape_xml(version)
            ));
        }

        xml.push_str("    </rdf:Description>\n");
        xml.push_str("  </rdf:RDF>\n");
        xml.push_str("</x:xmpmeta>\n");

        // Padding per XMP spec so in-place editors can grow the packet
        for _ in 0..40 {
            xml.push_str("                                                  \n");
        }

        xml.push_str(r#"<?xpacket end="w"?>"#);

        xml
    }
}

/// Escape special XML characters.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Format a timestamp in the ISO 8601 form XMP expects.
pub fn iso_timestamp(time: chrono::DateTime<chrono::Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xmp_writer_basic() {
        let xml = String::from_utf8(
            XmpWriter::new()
                .title("Sealed Document")
                .creator("QRSeal")
                .producer("QRSeal Engine")
                .build_bytes(),
        )
        .unwrap();

        assert!(xml.contains("<?xpacket begin"));
        assert!(xml.contains("<dc:title>"));
        assert!(xml.contains("Sealed Document"));
        assert!(xml.contains("<pdf:Producer>QRSeal Engine</pdf:Producer>"));
        assert!(xml.contains("<?xpacket end"));
    }

    #[test]
    fn test_xmp_writer_dates_and_version() {
        let xml = String::from_utf8(
            XmpWriter::new()
                .create_date("2024-01-15T10:30:00Z")
                .modify_date("2024-01-16T14:00:00Z")
                .pdf_version("1.6")
                .build_bytes(),
        )
        .unwrap();

        assert!(xml.contains("<xmp:CreateDate>2024-01-15T10:30:00Z</xmp:CreateDate>"));
        assert!(xml.contains("<xmp:ModifyDate>2024-01-16T14:00:00Z</xmp:ModifyDate>"));
        assert!(xml.contains("<pdf:PDFVersion>1.6</pdf:PDFVersion>"));
    }

    #[test]
    fn test_xmp_writer_xml_escape() {
        let xml = String::from_utf8(XmpWriter::new().title("A & B <C>").build_bytes()).unwrap();
        assert!(xml.contains("A &amp; B &lt;C&gt;"));
    }

    #[test]
    fn test_iso_timestamp() {
        use chrono::TimeZone;
        let time = chrono::Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        assert_eq!(iso_timestamp(time), "2024-03-01T09:30:00Z");
    }
}
