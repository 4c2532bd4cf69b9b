//! Default post composer: one captioned post per page of files.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use reelcast_core::{
    ArchivedFile, NormalizedTitle, OwnerId, OwnerPreferences, PersistenceStore, PostComposer,
    PostDraft, PosterLookup,
};
use tracing::warn;

use crate::normalize::{file_label, normalize};

/// Builds release posts from archived files.
///
/// Files are ordered by natural filename order, the release title comes from
/// the first file, and batches larger than `files_per_post` are split into
/// pages labelled `(Part i/N)`.
pub struct ReleaseComposer {
    store: Arc<dyn PersistenceStore>,
    posters: Arc<dyn PosterLookup>,
    public_base_url: String,
    files_per_post: usize,
}

impl ReleaseComposer {
    /// Construct a composer linking files under `public_base_url`.
    #[must_use]
    pub fn new(
        store: Arc<dyn PersistenceStore>,
        posters: Arc<dyn PosterLookup>,
        public_base_url: impl Into<String>,
        files_per_post: usize,
    ) -> Self {
        Self {
            store,
            posters,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            files_per_post: files_per_post.max(1),
        }
    }

    async fn preferences(&self, owner: OwnerId) -> OwnerPreferences {
        match self.store.owner_preferences(owner).await {
            Ok(preferences) => preferences,
            Err(err) => {
                warn!(error = %err, owner_id = %owner, "owner preferences unavailable; using defaults");
                OwnerPreferences::default()
            }
        }
    }

    async fn poster(&self, title: &NormalizedTitle) -> Option<String> {
        match self
            .posters
            .find_poster(&title.base_title, title.year.as_deref())
            .await
        {
            Ok(poster) => poster,
            Err(err) => {
                warn!(error = %err, title = %title.base_title, "poster lookup failed");
                None
            }
        }
    }
}

#[async_trait]
impl PostComposer for ReleaseComposer {
    async fn compose_posts(
        &self,
        owner: OwnerId,
        files: &[ArchivedFile],
    ) -> anyhow::Result<Vec<PostDraft>> {
        let mut ordered: Vec<&ArchivedFile> = files.iter().collect();
        ordered.sort_by(|left, right| natural_cmp(&left.media.file_name, &right.media.file_name));
        let Some(first) = ordered.first() else {
            return Ok(Vec::new());
        };

        let title = normalize(&first.media.file_name);
        let preferences = self.preferences(owner).await;
        let poster_url = if preferences.show_poster {
            self.poster(&title).await
        } else {
            None
        };

        let captions = render_captions(
            &title,
            &ordered,
            &self.public_base_url,
            self.files_per_post,
        );
        Ok(captions
            .into_iter()
            .map(|caption| PostDraft {
                poster_url: poster_url.clone(),
                caption,
                footer: preferences.footer_buttons.clone(),
            })
            .collect())
    }
}

/// Render every caption for an already ordered, non-empty file list.
fn render_captions(
    title: &NormalizedTitle,
    files: &[&ArchivedFile],
    base_url: &str,
    per_post: usize,
) -> Vec<String> {
    let header = header_line(title);

    if let [single] = files {
        let media = &single.media;
        return vec![format!(
            "{header}\n\n📁 `{label}` ({size})\n\n[🔗 Click Here to Get File]({link})",
            label = file_label(&media.file_name),
            size = format_bytes(media.size_bytes),
            link = file_link(base_url, &media.unique_id),
        )];
    }

    let pages: Vec<&[&ArchivedFile]> = files.chunks(per_post.max(1)).collect();
    let total = pages.len();
    pages
        .into_iter()
        .enumerate()
        .map(|(index, page)| {
            let page_header = if total > 1 {
                format!("{header} (Part {}/{total})", index + 1)
            } else {
                header.clone()
            };
            let lines: Vec<String> = page
                .iter()
                .map(|file| {
                    format!(
                        "📁 `{}` - [Click Here]({})",
                        file_label(&file.media.file_name),
                        file_link(base_url, &file.media.unique_id)
                    )
                })
                .collect();
            format!("{page_header}\n\n{}", lines.join("\n\n"))
        })
        .collect()
}

fn header_line(title: &NormalizedTitle) -> String {
    match &title.year {
        Some(year) => format!("🎬 *{} ({year})*", title.base_title),
        None => format!("🎬 *{}*", title.base_title),
    }
}

/// Stable per-file link resolved by the redirect service.
#[must_use]
pub fn file_link(base_url: &str, unique_id: &str) -> String {
    format!("{}/get/{unique_id}", base_url.trim_end_matches('/'))
}

/// Human-readable size using 1024-based units with two decimals.
#[must_use]
pub fn format_bytes(size: Option<u64>) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let Some(size) = size else {
        return "N/A".to_string();
    };

    #[allow(clippy::cast_precision_loss)]
    let mut value = size as f64;
    let mut unit = 0;
    while value > 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

/// Compare filenames so that embedded numbers sort numerically ("E2" before "E10").
#[must_use]
pub fn natural_cmp(left: &str, right: &str) -> Ordering {
    let left_chunks = chunks(left);
    let right_chunks = chunks(right);
    for (a, b) in left_chunks.iter().zip(&right_chunks) {
        let ordering = match (a.numeric, b.numeric) {
            (true, true) => {
                let a = a.text.trim_start_matches('0');
                let b = b.text.trim_start_matches('0');
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            }
            (false, false) => a.text.cmp(&b.text),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left_chunks.len().cmp(&right_chunks.len())
}

struct Chunk {
    numeric: bool,
    text: String,
}

fn chunks(value: &str) -> Vec<Chunk> {
    let mut out: Vec<Chunk> = Vec::new();
    for ch in value.chars() {
        let numeric = ch.is_ascii_digit();
        if let Some(last) = out.last_mut().filter(|last| last.numeric == numeric) {
            last.text.extend(ch.to_lowercase());
        } else {
            out.push(Chunk {
                numeric,
                text: ch.to_lowercase().collect(),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelcast_core::{FooterButton, NoPoster};
    use reelcast_test_support::mocks::{MemoryStore, StaticPosters, archived_file};

    fn composer(store: MemoryStore, per_post: usize) -> ReleaseComposer {
        ReleaseComposer::new(
            Arc::new(store),
            Arc::new(NoPoster),
            "http://relay.example/",
            per_post,
        )
    }

    #[test]
    fn bytes_use_binary_units() {
        assert_eq!(format_bytes(None), "N/A");
        assert_eq!(format_bytes(Some(512)), "512.00 B");
        assert_eq!(format_bytes(Some(1_024)), "1024.00 B");
        assert_eq!(format_bytes(Some(1_536)), "1.50 KB");
        assert_eq!(format_bytes(Some(734_003_200)), "700.00 MB");
    }

    #[test]
    fn natural_order_compares_numbers_by_value() {
        let mut names = vec!["Alpha E10.mkv", "alpha E2.mkv", "Alpha E1.mkv"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["Alpha E1.mkv", "alpha E2.mkv", "Alpha E10.mkv"]);
    }

    #[test]
    fn links_point_at_the_redirect_service() {
        assert_eq!(
            file_link("http://relay.example/", "AgAD1"),
            "http://relay.example/get/AgAD1"
        );
    }

    #[tokio::test]
    async fn single_file_post_shows_size_and_link() -> anyhow::Result<()> {
        let composer = composer(MemoryStore::new(), 20);
        let mut file = archived_file(1, "Movie.Title.2021.720p.BluRay.mkv");
        file.media.size_bytes = Some(1_536);
        file.media.unique_id = "uid-1".to_string();

        let drafts = composer.compose_posts(OwnerId(1), &[file]).await?;
        assert_eq!(drafts.len(), 1);
        assert_eq!(
            drafts[0].caption,
            "🎬 *Movie Title (2021)*\n\n📁 `Movie Title 2021 720p BluRay` (1.50 KB)\n\n[🔗 Click Here to Get File](http://relay.example/get/uid-1)"
        );
        assert!(drafts[0].poster_url.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn large_batches_are_paged() -> anyhow::Result<()> {
        let composer = composer(MemoryStore::new(), 20);
        let files: Vec<ArchivedFile> = (1..=45)
            .map(|episode| archived_file(1, &format!("Alpha.S01E{episode:02}.mkv")))
            .collect();

        let drafts = composer.compose_posts(OwnerId(1), &files).await?;
        assert_eq!(drafts.len(), 3);
        let counts: Vec<usize> = drafts
            .iter()
            .map(|draft| draft.caption.matches("📁").count())
            .collect();
        assert_eq!(counts, vec![20, 20, 5]);
        for (index, draft) in drafts.iter().enumerate() {
            let label = format!("🎬 *Alpha* (Part {}/3)", index + 1);
            assert!(draft.caption.starts_with(&label), "{}", draft.caption);
        }
        assert!(drafts[0].caption.contains("`Alpha S01E01`"));
        assert!(drafts[2].caption.contains("`Alpha S01E45`"));
        Ok(())
    }

    #[tokio::test]
    async fn single_page_has_no_part_label() -> anyhow::Result<()> {
        let composer = composer(MemoryStore::new(), 20);
        let files = vec![
            archived_file(1, "Alpha.S01E02.mkv"),
            archived_file(1, "Alpha.S01E01.mkv"),
        ];
        let drafts = composer.compose_posts(OwnerId(1), &files).await?;
        assert_eq!(drafts.len(), 1);
        assert!(!drafts[0].caption.contains("Part"));
        let first = drafts[0].caption.find("S01E01").expect("first episode listed");
        let second = drafts[0].caption.find("S01E02").expect("second episode listed");
        assert!(first < second);
        Ok(())
    }

    #[test]
    fn header_uses_single_asterisk_bold() {
        let with_year = NormalizedTitle {
            base_title: "Movie Title".to_string(),
            year: Some("2021".to_string()),
        };
        assert_eq!(header_line(&with_year), "🎬 *Movie Title (2021)*");

        let without_year = NormalizedTitle {
            base_title: "Alpha".to_string(),
            year: None,
        };
        let header = header_line(&without_year);
        assert_eq!(header, "🎬 *Alpha*");
        assert!(!header.contains("**"));
    }

    #[tokio::test]
    async fn poster_and_footer_follow_owner_preferences() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let footer = vec![FooterButton {
            label: "Join".to_string(),
            url: "https://t.me/example".to_string(),
        }];
        store.set_preferences(
            OwnerId(1),
            OwnerPreferences {
                show_poster: true,
                footer_buttons: footer.clone(),
            },
        );
        let composer = ReleaseComposer::new(
            Arc::new(store.clone()),
            Arc::new(StaticPosters::new("https://img.example/p.jpg")),
            "http://relay.example",
            20,
        );

        let drafts = composer
            .compose_posts(OwnerId(1), &[archived_file(1, "Alpha.mkv")])
            .await?;
        assert_eq!(drafts[0].poster_url.as_deref(), Some("https://img.example/p.jpg"));
        assert_eq!(drafts[0].footer, footer);

        store.set_preferences(
            OwnerId(1),
            OwnerPreferences {
                show_poster: false,
                footer_buttons: Vec::new(),
            },
        );
        let drafts = composer
            .compose_posts(OwnerId(1), &[archived_file(1, "Alpha.mkv")])
            .await?;
        assert!(drafts[0].poster_url.is_none());
        Ok(())
    }
}
