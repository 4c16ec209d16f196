use std::future::Future;

use crate::core::membership::MembershipError;

/// One page of a token-paginated listing.
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

/// Calls `fetch` with each page token until the provider stops returning one,
/// collecting items in the order the provider returned them.
///
/// The first call gets `None`. An error on any page fails the whole listing.
pub async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>, MembershipError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, MembershipError>>,
{
    let mut items = Vec::new();
    let mut page_token = None;

    loop {
        let page = fetch(page_token.take()).await?;
        items.extend(page.items);

        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::membership::RemoteService;
    use std::collections::VecDeque;

    fn page(items: &[u32], next: Option<&str>) -> Page<u32> {
        Page {
            items: items.to_vec(),
            next_page_token: next.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn follows_tokens_across_pages_in_order() {
        let mut pages = VecDeque::from(vec![
            page(&[1, 2], Some("p2")),
            page(&[3], Some("p3")),
            page(&[4, 5], None),
        ]);
        let mut tokens_seen = Vec::new();

        let items = collect_pages(|token| {
            tokens_seen.push(token);
            let next = pages.pop_front().expect("asked for more pages than exist");
            async move { Ok(next) }
        })
        .await
        .unwrap();

        assert_eq!(items, vec![1, 2, 3, 4, 5]);
        assert_eq!(
            tokens_seen,
            vec![None, Some("p2".to_string()), Some("p3".to_string())]
        );
    }

    #[tokio::test]
    async fn empty_token_ends_listing() {
        let mut pages = VecDeque::from(vec![page(&[7], Some(""))]);

        let items = collect_pages(|_| {
            let next = pages.pop_front().expect("asked for more pages than exist");
            async move { Ok(next) }
        })
        .await
        .unwrap();

        assert_eq!(items, vec![7]);
    }

    #[tokio::test]
    async fn error_on_later_page_fails_listing() {
        let mut calls = 0;

        let result: Result<Vec<u32>, _> = collect_pages(|_| {
            calls += 1;
            let outcome = if calls == 1 {
                Ok(page(&[1], Some("p2")))
            } else {
                Err(MembershipError::remote(RemoteService::Drive, "500"))
            };
            async move { outcome }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 2);
    }
}
