//! Locates Dockerfiles referencing the target base image.

use crate::forge::{ContentSet, ForgeClient, ForgeError};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, info_span, Instrument};

/// Maximum number of search attempts before concluding there is no work.
const SEARCH_ATTEMPTS: u32 = 5;

/// Delay between empty search attempts.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Outcome of an image search.
#[derive(Debug)]
pub enum LocateOutcome {
    /// At least one Dockerfile references the image.
    Found(ContentSet),

    /// No matches after all attempts; the run has nothing to do.
    NotFound,
}

/// Searches for Dockerfiles referencing `image`, optionally scoped to an
/// organization.
///
/// The code search index lags behind content changes, so an empty result is
/// retried with a fixed delay between attempts, stopping as soon as a
/// non-empty set is observed. An empty result after the final attempt is
/// [`LocateOutcome::NotFound`], an expected outcome rather than an error.
///
/// # Errors
///
/// Returns [`ForgeError`] if the search call itself fails.
pub async fn locate_images(
    client: &dyn ForgeClient,
    image: &str,
    org: Option<&str>,
) -> Result<LocateOutcome, ForgeError> {
    let span = info_span!("locate", image = %image);

    async {
        for attempt in 1..=SEARCH_ATTEMPTS {
            let contents = client.search_content_by_image(image, org).await?;
            if !contents.is_empty() {
                info!(total = contents.total, "Found Dockerfiles with the given image");
                return Ok(LocateOutcome::Found(contents));
            }

            if attempt < SEARCH_ATTEMPTS {
                debug!(attempt, "Search returned nothing, retrying");
                sleep(RETRY_DELAY).await;
            }
        }

        info!("Could not find any repositories with the given image");
        Ok(LocateOutcome::NotFound)
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::mock::{MockForge, MockOperation};

    #[tokio::test]
    async fn finds_matches_on_first_attempt() {
        let forge = MockForge::new();
        forge.add_match("acme/service", "Dockerfile");

        let outcome = locate_images(&forge, "library/ubuntu", None).await.unwrap();
        assert!(matches!(outcome, LocateOutcome::Found(set) if set.total == 1));
        assert_eq!(forge.operations().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_the_index_catches_up() {
        let forge = MockForge::new();
        forge.add_match("acme/service", "Dockerfile");
        forge.set_empty_searches(3);

        let outcome = locate_images(&forge, "library/ubuntu", None).await.unwrap();
        assert!(matches!(outcome, LocateOutcome::Found(_)));
        assert_eq!(forge.operations().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn reports_not_found_after_all_attempts() {
        let forge = MockForge::new();

        let outcome = locate_images(&forge, "library/ubuntu", None).await.unwrap();
        assert!(matches!(outcome, LocateOutcome::NotFound));
        assert_eq!(forge.operations().len(), 5);
    }

    #[tokio::test]
    async fn scopes_the_search_to_the_organization() {
        let forge = MockForge::new();
        forge.add_match("acme/service", "Dockerfile");

        locate_images(&forge, "library/ubuntu", Some("acme"))
            .await
            .unwrap();

        assert_eq!(
            forge.operations(),
            vec![MockOperation::Search {
                image: "library/ubuntu".to_string(),
                org: Some("acme".to_string()),
            }]
        );
    }
}
