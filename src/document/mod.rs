/*!
 * Word (`.docx`) document handling.
 *
 * - `package`: zip container read and rewrite
 * - `xml`: lossless XML tree for the WordprocessingML parts
 * - `model`: paragraphs across body, tables, headers and footers
 * - `segmenter`: prefix stripping, deduplication and reassembly
 */

pub use self::model::{DocxDocument, ParagraphRef};
pub use self::package::DocxPackage;
pub use self::segmenter::{SegmentSet, Segmenter, TextSegment};

pub mod model;
pub mod package;
pub mod segmenter;
pub mod xml;
