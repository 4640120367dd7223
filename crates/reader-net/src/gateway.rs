use crate::error::ApiResult;
use crate::listing::{FIRST_ARTICLE_PAGE, article_page};
use crate::models::{Article, ArticleListing, Banner, LoginPayload, UserInfoPayload};
use crate::pipeline::RequestPipeline;
use crate::transport::ApiRequest;
use reader_core::model::{Page, UserProfile};
use reader_core::paging::{PageFetcher, PageFuture, PagingEngine};
use reader_core::session::{ProfileFuture, ProfileSource};
use std::sync::Arc;

pub(crate) const LOGIN_PATH: &str = "user/login";
const LOGOUT_PATH: &str = "user/logout/json";
const PROFILE_PATH: &str = "user/lg/userinfo/json";
const BANNER_PATH: &str = "banner/json";

/// Typed endpoints of the content service, all routed through one pipeline.
#[derive(Clone)]
pub struct ApiGateway {
    pipeline: Arc<RequestPipeline>,
}

impl ApiGateway {
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &Arc<RequestPipeline> {
        &self.pipeline
    }

    pub async fn article_page(&self, page: u32) -> ApiResult<Page<Article>> {
        let url = self.pipeline.url(&format!("article/list/{page}/json"))?;
        let listing: ArticleListing = self.pipeline.call(ApiRequest::get(url)).await?;
        Ok(article_page(listing))
    }

    pub async fn banners(&self) -> ApiResult<Vec<Banner>> {
        let url = self.pipeline.url(BANNER_PATH)?;
        self.pipeline.call(ApiRequest::get(url)).await
    }

    pub async fn login(&self, username: &str, password: &str) -> ApiResult<LoginPayload> {
        let url = self.pipeline.url(LOGIN_PATH)?;
        let request = ApiRequest::post_form(url, [("username", username), ("password", password)]);
        self.pipeline.call(request).await
    }

    pub async fn logout(&self) -> ApiResult<()> {
        let url = self.pipeline.url(LOGOUT_PATH)?;
        self.pipeline.call_empty(ApiRequest::get(url)).await
    }

    pub async fn user_profile(&self) -> ApiResult<UserProfile> {
        let url = self.pipeline.url(PROFILE_PATH)?;
        let payload: UserInfoPayload = self.pipeline.call(ApiRequest::get(url)).await?;
        Ok(payload.into_profile())
    }

    /// A paging engine over the home article feed.
    pub fn article_feed(&self) -> PagingEngine<Article> {
        PagingEngine::new(FIRST_ARTICLE_PAGE, ArticleFetcher(self.clone()))
    }
}

impl ProfileSource for ApiGateway {
    fn fetch_profile(&self) -> ProfileFuture<'_> {
        Box::pin(async move { Ok(self.user_profile().await?) })
    }
}

struct ArticleFetcher(ApiGateway);

impl PageFetcher<Article> for ArticleFetcher {
    fn fetch(&self, page: u32) -> PageFuture<'_, Article> {
        Box::pin(async move { Ok(self.0.article_page(page).await?) })
    }
}
