//! Page navigation: a history stack plus URL mapping for deep links.
//!
//! The history always holds at least one entry and the current page is the
//! last one. Drill-down pages are pushed, tab destinations replace the whole stack,
//! and going back from the root is a no-op.
//!
//! # Routes
//!
//! ```text
//! /                       - Home
//! /categories             - Category grid
//! /categories/{id}        - Shops in a category (also /shops?category={id})
//! /shops/{id}             - Shop page
//! /product/{id}           - Product detail
//! /cart                   - Cart
//! /settings               - Settings
//! ```

use serde::Serialize;
use suq_core::{CategoryId, ProductId, ShopId};
use thiserror::Error;
use url::Url;

/// Base used to parse bare paths as URLs.
const PATH_BASE: &str = "http://suq.local";

/// Errors from deep-link resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("invalid link: {0}")]
    InvalidLink(String),
    #[error("no page matches route: {0}")]
    UnknownRoute(String),
}

/// Every page the storefront can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    Home,
    Categories,
    ShopList,
    Shop,
    ProductDetail,
    Cart,
    Settings,
}

impl Page {
    /// The four bottom-bar destinations, in display order.
    pub const TABS: [Self; 4] = [Self::Home, Self::Categories, Self::Cart, Self::Settings];

    /// Whether this page is a bottom-bar destination.
    #[must_use]
    pub const fn is_tab(&self) -> bool {
        matches!(
            self,
            Self::Home | Self::Categories | Self::Cart | Self::Settings
        )
    }

    /// Drill-down detail views hide the bottom bar.
    #[must_use]
    pub const fn shows_tab_bar(&self) -> bool {
        !matches!(self, Self::ProductDetail | Self::Shop)
    }

    /// The tab a page is reached from when opened without history.
    #[must_use]
    pub const fn home_tab(&self) -> Self {
        match self {
            Self::Categories | Self::ShopList => Self::Categories,
            Self::Cart => Self::Cart,
            Self::Settings => Self::Settings,
            Self::Home | Self::Shop | Self::ProductDetail => Self::Home,
        }
    }
}

/// Optional parameters carried by a navigation entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shop_id: Option<ShopId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
}

impl RouteParams {
    #[must_use]
    pub fn category(id: CategoryId) -> Self {
        Self {
            category_id: Some(id),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn shop(id: ShopId) -> Self {
        Self {
            shop_id: Some(id),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn product(id: ProductId) -> Self {
        Self {
            product_id: Some(id),
            ..Self::default()
        }
    }
}

/// One entry in the navigation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavEntry {
    pub page: Page,
    pub params: RouteParams,
}

impl NavEntry {
    #[must_use]
    pub fn new(page: Page, params: RouteParams) -> Self {
        Self { page, params }
    }

    /// Entry without parameters.
    #[must_use]
    pub fn root(page: Page) -> Self {
        Self::new(page, RouteParams::default())
    }

    /// URL path for this entry. Falls back to the parent listing when a
    /// required parameter is missing.
    #[must_use]
    pub fn to_path(&self) -> String {
        match (self.page, &self.params) {
            (Page::Home, _) => "/".to_string(),
            (Page::Categories, _) => "/categories".to_string(),
            (Page::ShopList, RouteParams { category_id: Some(id), .. }) => {
                format!("/categories/{}", urlencoding::encode(id.as_str()))
            }
            (Page::ShopList, _) => "/categories".to_string(),
            (Page::Shop, RouteParams { shop_id: Some(id), .. }) => {
                format!("/shops/{}", urlencoding::encode(id.as_str()))
            }
            (Page::ProductDetail, RouteParams { product_id: Some(id), .. }) => {
                format!("/product/{}", urlencoding::encode(id.as_str()))
            }
            (Page::Shop | Page::ProductDetail, _) => "/".to_string(),
            (Page::Cart, _) => "/cart".to_string(),
            (Page::Settings, _) => "/settings".to_string(),
        }
    }
}

/// Stack-backed navigation state.
///
/// The root entry is held separately from the drill-down trail, so the
/// history can never be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Navigator {
    root: NavEntry,
    trail: Vec<NavEntry>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    /// Start at the home page.
    #[must_use]
    pub fn new() -> Self {
        Self::at(NavEntry::root(Page::Home))
    }

    /// Start with a single root entry.
    #[must_use]
    pub const fn at(root: NavEntry) -> Self {
        Self {
            root,
            trail: Vec::new(),
        }
    }

    /// Push a page; it becomes current.
    pub fn navigate_to(&mut self, page: Page, params: RouteParams) {
        tracing::debug!(?page, depth = self.depth() + 1, "Navigate");
        self.trail.push(NavEntry::new(page, params));
    }

    /// Pop the current page. Returns `false` (and does nothing) at the root.
    pub fn go_back(&mut self) -> bool {
        self.trail.pop().is_some()
    }

    /// Replace the whole history with a single root entry for `page`.
    pub fn navigate_tab(&mut self, page: Page) {
        tracing::debug!(?page, "Switch tab");
        self.trail.clear();
        self.root = NavEntry::root(page);
    }

    /// The current entry (`history.last`).
    #[must_use]
    pub fn current(&self) -> &NavEntry {
        self.trail.last().unwrap_or(&self.root)
    }

    /// The bottom entry of the history.
    #[must_use]
    pub const fn root(&self) -> &NavEntry {
        &self.root
    }

    /// History from root to current.
    pub fn history(&self) -> impl Iterator<Item = &NavEntry> {
        std::iter::once(&self.root).chain(self.trail.iter())
    }

    /// Number of entries in the history, at least one.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.trail.len() + 1
    }

    /// Whether the presentation layer should draw the bottom bar.
    #[must_use]
    pub fn shows_tab_bar(&self) -> bool {
        self.current().page.shows_tab_bar()
    }

    /// The tab to highlight, if the current page is a tab destination.
    #[must_use]
    pub fn active_tab(&self) -> Option<Page> {
        let page = self.current().page;
        page.is_tab().then_some(page)
    }

    /// URL path of the current entry.
    #[must_use]
    pub fn current_path(&self) -> String {
        self.current().to_path()
    }
}

/// Resolve an external path or URL into navigation state.
///
/// Drill-down targets get a synthesized root entry for their owning tab so
/// that going back lands somewhere sensible.
///
/// # Errors
///
/// Returns [`NavigationError::InvalidLink`] if the input cannot be parsed and
/// [`NavigationError::UnknownRoute`] if no page matches.
pub fn resolve_deep_link(link: &str) -> Result<Navigator, NavigationError> {
    let target = parse_route(link)?;

    if target.page.is_tab() {
        return Ok(Navigator::at(target));
    }

    let mut navigator = Navigator::at(NavEntry::root(target.page.home_tab()));
    navigator.navigate_to(target.page, target.params);
    Ok(navigator)
}

/// Map a path or URL to a single navigation entry.
///
/// # Errors
///
/// See [`resolve_deep_link`].
pub fn parse_route(link: &str) -> Result<NavEntry, NavigationError> {
    let base = Url::parse(PATH_BASE).map_err(|e| NavigationError::InvalidLink(e.to_string()))?;
    let url = Url::options()
        .base_url(Some(&base))
        .parse(link.trim())
        .map_err(|e| NavigationError::InvalidLink(format!("{link}: {e}")))?;

    let decoded = url
        .path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .map(|s| urlencoding::decode(s).map(std::borrow::Cow::into_owned))
                .collect::<Result<Vec<String>, _>>()
        })
        .transpose()
        .map_err(|e| NavigationError::InvalidLink(format!("{link}: {e}")))?
        .unwrap_or_default();
    let segments: Vec<&str> = decoded.iter().map(String::as_str).collect();
    let query_category = url
        .query_pairs()
        .find(|(key, _)| key == "category")
        .map(|(_, value)| CategoryId::new(value.into_owned()));

    let entry = match segments.as_slice() {
        [] | ["home"] => NavEntry::root(Page::Home),
        ["categories"] => NavEntry::root(Page::Categories),
        ["categories", id] => NavEntry::new(Page::ShopList, RouteParams::category((*id).into())),
        ["shops"] => match query_category {
            Some(category) => NavEntry::new(Page::ShopList, RouteParams::category(category)),
            None => NavEntry::root(Page::Categories),
        },
        ["shops" | "store", id] => NavEntry::new(Page::Shop, RouteParams::shop((*id).into())),
        ["product" | "products", id] => {
            NavEntry::new(Page::ProductDetail, RouteParams::product((*id).into()))
        }
        ["cart"] => NavEntry::root(Page::Cart),
        ["settings"] => NavEntry::root(Page::Settings),
        _ => return Err(NavigationError::UnknownRoute(url.path().to_string())),
    };

    Ok(entry)
}
