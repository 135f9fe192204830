use super::PlatformError;

/// Follow `next_cursor` values until Slack stops returning one.
pub fn collect_cursor_pages<T, F>(mut fetch: F) -> Result<Vec<T>, PlatformError>
where
    F: FnMut(Option<&str>) -> Result<(Vec<T>, Option<String>), PlatformError>,
{
    let mut out = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let (items, next) = fetch(cursor.as_deref())?;
        out.extend(items);
        let next = next.filter(|c| !c.trim().is_empty());
        match next {
            Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
            _ => break,
        }
    }
    Ok(out)
}

/// Walk 1-based numbered pages until the reported page count is reached.
pub fn collect_numbered_pages<T, F>(mut fetch: F) -> Result<Vec<T>, PlatformError>
where
    F: FnMut(u32) -> Result<(Vec<T>, u32), PlatformError>,
{
    let mut out = Vec::new();
    let mut page = 1u32;
    loop {
        let (items, pages) = fetch(page)?;
        let empty = items.is_empty();
        out.extend(items);
        if empty || page >= pages {
            break;
        }
        page += 1;
    }
    Ok(out)
}
