//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use chrono::Utc;
use tower_sessions::Session;
use tracing::instrument;

use emporium_core::{ContentBlockType, Placement};
use emporium_db::{ContentBlock, ContentBlockRepository, DealRepository, ProductRepository};

use crate::error::Result;
use crate::filters;
use crate::routes::layout::Layout;
use crate::routes::products::{ProductCard, cheapest_deals};
use crate::state::AppState;

/// Featured products shown on the home page.
const FEATURED_LIMIT: i64 = 8;

/// Content block display data.
#[derive(Clone)]
pub struct ContentBlockView {
    pub key: String,
    pub title: String,
    pub body: String,
    pub kind: &'static str,
    /// Body is trusted HTML written in the back-office.
    pub is_html: bool,
}

impl From<&ContentBlock> for ContentBlockView {
    fn from(block: &ContentBlock) -> Self {
        Self {
            key: block.key.clone(),
            title: block.title.clone(),
            body: block.body.clone(),
            kind: block.block_type.as_str(),
            is_html: block.block_type == ContentBlockType::Html,
        }
    }
}

/// Flash deal display data.
#[derive(Clone)]
pub struct DealView {
    pub title: String,
    pub product_slug: String,
    pub product_name: String,
    pub deal_price: String,
    pub regular_price: String,
    pub ends_at: String,
    pub remaining: Option<i32>,
}

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub layout: Layout,
    pub blocks: Vec<ContentBlockView>,
    pub deals: Vec<DealView>,
    pub featured: Vec<ProductCard>,
}

/// Display the home page.
#[instrument(skip(state, session))]
pub async fn home(State(state): State<AppState>, session: Session) -> Result<impl IntoResponse> {
    let layout = Layout::load(&state, &session).await;
    let pool = state.pool();
    let now = Utc::now();

    let blocks = ContentBlockRepository::new(pool)
        .active_for_placement(Placement::Home, now)
        .await?;
    let deals = DealRepository::new(pool).active(now).await?;
    let featured = ProductRepository::new(pool).featured(FEATURED_LIMIT).await?;

    let best = cheapest_deals(&deals);
    let featured = featured
        .iter()
        .map(|p| ProductCard::new(p, best.get(&p.id).copied(), &layout))
        .collect();
    let deals = deals
        .iter()
        .filter(|d| d.deal_price < d.regular_price)
        .map(|d| DealView {
            title: d.title.clone(),
            product_slug: d.product_slug.clone(),
            product_name: d.product_name.clone(),
            deal_price: layout.money(d.deal_price),
            regular_price: layout.money(d.regular_price),
            ends_at: d.ends_at.format("%b %-d, %H:%M UTC").to_string(),
            remaining: d.rule().remaining(),
        })
        .collect();

    Ok(HomeTemplate {
        layout,
        blocks: blocks.iter().map(ContentBlockView::from).collect(),
        deals,
        featured,
    })
}
