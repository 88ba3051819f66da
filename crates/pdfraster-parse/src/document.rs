//! lopdf-based document and page facade.
//!
//! Wraps [`lopdf::Document`] with the page-level access the image pipeline
//! needs: an ordered page list, per-page rotation and resources (both
//! inherited through the page tree via `/Parent`), and the page's content
//! bytes with stream-level filters already applied.

use crate::error::BackendError;

/// How many `/Parent` links the page-tree walk follows before assuming
/// the tree is cyclic.
const MAX_PAGE_TREE_DEPTH: usize = 64;

/// A parsed PDF document with its ordered page list.
pub struct PdfDocument {
    inner: lopdf::Document,
    page_ids: Vec<lopdf::ObjectId>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("page_count", &self.page_ids.len())
            .finish_non_exhaustive()
    }
}

impl PdfDocument {
    /// Load a document from a file path.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self, BackendError> {
        lopdf::Document::load(path)
            .map(Self::from_document)
            .map_err(|e| BackendError::Parse(format!("not a readable PDF: {e}")))
    }

    /// Load a document from in-memory bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BackendError> {
        lopdf::Document::load_mem(bytes)
            .map(Self::from_document)
            .map_err(|e| BackendError::Parse(format!("not a readable PDF: {e}")))
    }

    /// Wrap an already-parsed lopdf document.
    pub fn from_document(inner: lopdf::Document) -> Self {
        // Flatten the page map (keyed by 1-based page number) into a list
        // indexed by 0-based position
        let page_ids = inner.get_pages().values().copied().collect();
        Self { inner, page_ids }
    }

    /// Access the underlying lopdf document.
    pub fn inner(&self) -> &lopdf::Document {
        &self.inner
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn page_id(&self, index: usize) -> Result<lopdf::ObjectId, BackendError> {
        self.page_ids.get(index).copied().ok_or_else(|| {
            BackendError::Parse(format!(
                "page index {index} out of range (0..{})",
                self.page_ids.len()
            ))
        })
    }

    /// The page's `/Rotate` value in degrees, inherited through the page
    /// tree. Missing or malformed rotations count as 0.
    pub fn page_rotation(&self, index: usize) -> Result<i32, BackendError> {
        let page_id = self.page_id(index)?;
        let rotation = inherited_entry(&self.inner, page_id, b"Rotate")
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(0);
        Ok(rotation as i32)
    }

    /// The page's resources dictionary, inherited through the page tree.
    /// Missing resources come back as an empty dictionary.
    pub fn page_resources(&self, index: usize) -> Result<lopdf::Dictionary, BackendError> {
        let page_id = self.page_id(index)?;
        let obj = match inherited_entry(&self.inner, page_id, b"Resources") {
            Some(obj) => obj,
            None => return Ok(lopdf::Dictionary::new()),
        };
        let obj = match obj {
            lopdf::Object::Reference(id) => self
                .inner
                .get_object(*id)
                .map_err(|e| BackendError::Parse(format!("bad /Resources reference: {e}")))?,
            other => other,
        };
        obj.as_dict()
            .cloned()
            .map_err(|e| BackendError::Parse(format!("Resources is not a dictionary: {e}")))
    }

    /// The page's content bytes: every `/Contents` stream decoded and
    /// concatenated in order.
    pub fn page_content(&self, index: usize) -> Result<Vec<u8>, BackendError> {
        let page_id = self.page_id(index)?;
        let page = self
            .inner
            .get_object(page_id)
            .and_then(|o| o.as_dict())
            .map_err(|e| BackendError::Parse(format!("page {index} is not usable: {e}")))?;

        let contents = match page.get(b"Contents") {
            Ok(obj) => obj,
            Err(_) => return Ok(Vec::new()),
        };

        let stream_ids: Vec<&lopdf::Object> = match contents {
            lopdf::Object::Array(arr) => arr.iter().collect(),
            other => vec![other],
        };

        let mut content = Vec::new();
        for obj in stream_ids {
            let stream = match obj {
                lopdf::Object::Reference(id) => self
                    .inner
                    .get_object(*id)
                    .and_then(|o| o.as_stream())
                    .map_err(|e| {
                        BackendError::Parse(format!("bad /Contents reference: {e}"))
                    })?,
                lopdf::Object::Stream(s) => s,
                other => {
                    return Err(BackendError::Parse(format!(
                        "unexpected /Contents entry: {other:?}"
                    )));
                }
            };
            let bytes = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            if !content.is_empty() {
                content.push(b'\n');
            }
            content.extend_from_slice(&bytes);
        }
        Ok(content)
    }
}

/// Find `key` on the page or on the nearest ancestor that carries it.
///
/// The search visits the page's dictionary and then each `/Parent` in
/// turn; a broken link ends the chain, and [`MAX_PAGE_TREE_DEPTH`] bounds
/// it against cyclic trees.
fn inherited_entry<'a>(
    doc: &'a lopdf::Document,
    page_id: lopdf::ObjectId,
    key: &[u8],
) -> Option<&'a lopdf::Object> {
    page_tree_chain(doc, page_id)
        .take(MAX_PAGE_TREE_DEPTH)
        .find_map(|dict| dict.get(key).ok())
}

/// Iterate the dictionaries from a page up its `/Parent` chain.
fn page_tree_chain<'a>(
    doc: &'a lopdf::Document,
    page_id: lopdf::ObjectId,
) -> impl Iterator<Item = &'a lopdf::Dictionary> + 'a {
    let mut next = Some(page_id);
    std::iter::from_fn(move || {
        let dict = doc.get_object(next.take()?).ok()?.as_dict().ok()?;
        next = dict
            .get(b"Parent")
            .ok()
            .and_then(|parent| parent.as_reference().ok());
        Some(dict)
    })
}
