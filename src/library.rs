//! Catalog listing and the comic selection loop.

use crate::prelude::*;

/// One listing line, numbered from 1.
pub fn catalog_line(number: usize, comic: &Comic) -> String {
    format!(
        "{}. {} (Pages: {}, Cover: {}, Read: {}, Progress: {:.1}%)",
        number,
        comic.title,
        comic.page_count,
        comic.cover_image,
        comic.current_page,
        comic.progress * 100.0
    )
}

pub fn print_catalog(comics: &[Comic], out: &mut impl Write) -> Result<()> {
    if comics.is_empty() {
        writeln!(out, "No comics found.")?;
    }
    for (i, comic) in comics.iter().enumerate() {
        writeln!(out, "{}", catalog_line(i + 1, comic))?;
    }
    Ok(())
}

/// What the user typed at the catalog prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum Selection {
    Open(usize),
    Quit,
    Invalid(String),
}

pub fn parse_selection(line: &str, count: usize) -> Selection {
    let line = line.trim();
    if line.eq_ignore_ascii_case("q") || line.eq_ignore_ascii_case("quit") {
        return Selection::Quit;
    }
    match line.parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Selection::Open(n - 1),
        Ok(n) => Selection::Invalid(format!("{} is not between 1 and {}", n, count)),
        Err(_) => Selection::Invalid(format!("'{}' is not a comic number", line)),
    }
}

/// Catalog prompt loop. Returns when the user quits or input ends; the store
/// is saved on the way out.
pub fn select_comic(
    comics: &mut [Comic],
    store: &mut ProgressStore,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<()> {
    loop {
        print_catalog(comics, out)?;
        if comics.is_empty() {
            break;
        }
        writeln!(
            out,
            "Enter comic number to open (1-{}), or 'q' to quit",
            comics.len()
        )?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        match parse_selection(&line, comics.len()) {
            Selection::Quit => break,
            Selection::Invalid(msg) => writeln!(out, "{}", msg)?,
            Selection::Open(index) => run_comic(&mut comics[index], store, input, out)?,
        }
    }

    store
        .save()
        .with_context(|| format!("Couldn't save progress to {}", store.path().display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comic(title: &str, pages: usize) -> Comic {
        Comic::new(
            Path::new(&format!("/comics/{}.cbz", title)),
            ComicMetadata {
                format: FormatKind::Cbz,
                cover_image: CoverImage::Missing,
                page_count: pages,
            },
        )
    }

    #[test]
    fn listing_lines() {
        let mut saga = comic("Saga", 10);
        saga.set_current_page(5);
        assert_eq!(
            catalog_line(1, &saga),
            "1. Saga (Pages: 10, Cover: No cover image found, Read: 5, Progress: 50.0%)"
        );

        let broken = Comic::degraded(Path::new("/comics/bad.cbz"), FormatKind::Cbz, "bad zip");
        assert_eq!(
            catalog_line(2, &broken),
            "2. bad (Pages: 0, Cover: Error: bad zip, Read: 0, Progress: 0.0%)"
        );
    }

    #[test]
    fn selections() {
        assert_eq!(parse_selection("2\n", 3), Selection::Open(1));
        assert_eq!(parse_selection(" Q ", 3), Selection::Quit);
        assert!(matches!(parse_selection("4", 3), Selection::Invalid(_)));
        assert!(matches!(parse_selection("0", 3), Selection::Invalid(_)));
        assert!(matches!(parse_selection("abc", 3), Selection::Invalid(_)));
    }

    #[test]
    fn quitting_saves_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.toml");
        let mut store = ProgressStore::new(&path);
        let mut comics = vec![comic("A", 3), comic("B", 4)];

        let mut input = std::io::Cursor::new("7\nq\n");
        let mut out = Vec::new();
        select_comic(&mut comics, &mut store, &mut input, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Enter comic number to open (1-2), or 'q' to quit"));
        assert!(text.contains("7 is not between 1 and 2"));
        assert!(path.exists());
    }
}
