use crate::models::{Article, ArticleListing};
use reader_core::model::Page;

pub(crate) const FIRST_ARTICLE_PAGE: u32 = 0;

/// The listing's `curPage` is one-based while the request path is
/// zero-based, so `curPage` is already the next page to ask for.
pub(crate) fn article_page(listing: ArticleListing) -> Page<Article> {
    let has_more = !listing.over && listing.cur_page < listing.page_count;
    Page {
        items: listing.datas,
        next_page: listing.cur_page,
        has_more,
    }
}
