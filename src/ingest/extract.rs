use bytes::Bytes;

pub const PDF_MIME: &str = "application/pdf";

/// Page separator in extracted PDF text.
const PAGE_BREAK: &str = "\n\n";
/// Form feed, emitted between pages by the PDF text extractor.
const FORM_FEED: char = '\u{c}';

/// Pull the raw text out of an uploaded file.
///
/// PDFs are run through the text extractor; every other type is read as
/// UTF-8 with invalid sequences replaced.
pub async fn extract_text(mime_type: &str, data: Bytes) -> Result<String, String> {
    if mime_type != PDF_MIME {
        return Ok(String::from_utf8_lossy(&data).into_owned());
    }

    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
        .await
        .map_err(|e| format!("PDF extraction task failed: {e}"))?
        .map_err(|e| format!("PDF extraction error: {e}"))?;

    Ok(join_pages(text.split(FORM_FEED)))
}

/// Each page's text items joined by single spaces, pages separated by a
/// blank line. Pages with no text are dropped.
pub fn join_pages<'a>(pages: impl IntoIterator<Item = &'a str>) -> String {
    pages
        .into_iter()
        .map(|page| page.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join(PAGE_BREAK)
}
