//! Markdown rendering of the digest, grouped by category.

use crate::models::Digest;
use crate::utils::upcase;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Write as _;
use tokio::fs;
use tracing::{info, instrument};

/// Render a [`Digest`] as a Markdown document.
///
/// Articles are grouped under their first category, categories sorted
/// alphabetically. Articles without a category land under "Uncategorized".
pub fn digest_to_markdown(digest: &Digest) -> String {
    let mut md = String::new();
    writeln!(
        md,
        "# {} Edition - {}\n",
        upcase(&digest.time_of_day),
        digest.local_date
    )
    .unwrap();
    writeln!(md, "{} articles selected.\n", digest.articles.len()).unwrap();

    let mut by_category: BTreeMap<&str, Vec<&crate::models::DigestArticle>> = BTreeMap::new();
    for article in &digest.articles {
        let category = article
            .categories
            .first()
            .map(|c| c.as_str())
            .unwrap_or("Uncategorized");
        by_category.entry(category).or_default().push(article);
    }

    for (category, articles) in by_category {
        writeln!(md, "## {}\n", category).unwrap();
        for article in articles {
            writeln!(md, "- [{}]({}) ({})", article.title, article.url, article.source).unwrap();
            if let Some(summary) = &article.summary {
                writeln!(md, "  - {}", summary).unwrap();
            }
        }
        md.push('\n');
    }

    md
}

/// Write the rendered digest to `{dir}/{date}_{edition}.md`.
#[instrument(level = "info", skip_all, fields(markdown_output_dir = %markdown_output_dir))]
pub async fn write_digest(
    digest: &Digest,
    markdown_output_dir: &str,
) -> Result<(), Box<dyn Error>> {
    let md = digest_to_markdown(digest);
    let path = format!(
        "{}/{}_{}.md",
        markdown_output_dir, digest.local_date, digest.time_of_day
    );
    fs::write(&path, md).await?;
    info!(%path, "Wrote Markdown digest");
    Ok(())
}
