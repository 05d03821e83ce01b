//! PDF page splitting.

use lopdf::Document;

use super::OcrError;

pub fn load(pdf: &[u8]) -> Result<Document, OcrError> {
    Ok(Document::load_mem(pdf)?)
}

/// 1-based page numbers in document order.
pub fn page_numbers(doc: &Document) -> Vec<u32> {
    doc.get_pages().keys().copied().collect()
}

/// Serialize a copy of `doc` holding only `keep`.
pub fn subset(doc: &Document, keep: &[u32]) -> Result<Vec<u8>, OcrError> {
    let mut sub = doc.clone();
    let drop: Vec<u32> = page_numbers(&sub)
        .into_iter()
        .filter(|page| !keep.contains(page))
        .collect();
    if !drop.is_empty() {
        sub.delete_pages(&drop);
    }
    sub.prune_objects();
    sub.renumber_objects();

    let mut out = Vec::new();
    sub.save_to(&mut out)
        .map_err(|e| OcrError::Pdf(e.to_string()))?;
    Ok(out)
}


#[cfg(test)]
mod tests {
    use super::testing::{build_pdf, page_labels};
    use super::*;

    #[test]
    fn test_page_numbers() {
        let doc = load(&build_pdf(4, 10)).unwrap();
        assert_eq!(page_numbers(&doc), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_subset_keeps_requested_pages() {
        let pdf = build_pdf(5, 200);
        let doc = load(&pdf).unwrap();

        let sub = subset(&doc, &[2, 3]).unwrap();
        assert_eq!(page_labels(&sub), vec![2, 3]);
        assert!(sub.len() < pdf.len());

        let single = subset(&doc, &[5]).unwrap();
        assert_eq!(page_labels(&single), vec![5]);
    }

    #[test]
    fn test_load_rejects_garbage() {
        assert!(matches!(load(b"not a pdf"), Err(OcrError::Pdf(_))));
    }
}
