//! Tweet cards: the visual unit the bridge creates per item.
use mps_social::item::{fields, Item, ItemId};
use std::sync::Arc;

/// Anything the bridge can keep in sync with an item.
pub trait Card: Send {
    fn item(&self) -> &Arc<Item>;

    /// Replace the displayed content without touching the card's position.
    fn set_item(&mut self, item: Arc<Item>);

    fn item_id(&self) -> &ItemId {
        &self.item().id
    }
}

type ActionHandler = Box<dyn Fn(&Arc<Item>) + Send>;

pub struct TweetCard {
    item: Arc<Item>,
    default_avatar: Arc<str>,
    avatar: String,
    markup: String,
    on_reply: Vec<ActionHandler>,
    on_retweet: Vec<ActionHandler>,
}

impl TweetCard {
    pub fn new(item: Arc<Item>, default_avatar: Arc<str>) -> Self {
        let mut card = Self {
            item: item.clone(),
            default_avatar,
            avatar: String::new(),
            markup: String::new(),
            on_reply: Vec::new(),
            on_retweet: Vec::new(),
        };
        card.set_item(item);
        card
    }

    /// Avatar image path: the item's `authoricon`, else the configured default.
    pub fn avatar(&self) -> &str {
        &self.avatar
    }

    /// Pango-style markup: author in bold followed by the content.
    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn connect_reply(&mut self, handler: impl Fn(&Arc<Item>) + Send + 'static) {
        self.on_reply.push(Box::new(handler));
    }

    pub fn connect_retweet(&mut self, handler: impl Fn(&Arc<Item>) + Send + 'static) {
        self.on_retweet.push(Box::new(handler));
    }

    pub fn click_reply(&self) {
        for handler in &self.on_reply {
            handler(&self.item);
        }
    }

    pub fn click_retweet(&self) {
        for handler in &self.on_retweet {
            handler(&self.item);
        }
    }
}

impl Card for TweetCard {
    fn item(&self) -> &Arc<Item> {
        &self.item
    }

    fn set_item(&mut self, item: Arc<Item>) {
        self.avatar = item
            .get(fields::AUTHOR_ICON)
            .unwrap_or(&*self.default_avatar)
            .to_string();
        self.markup = format!(
            "<b>{}</b> {}",
            escape_markup(item.get_or_empty(fields::AUTHOR)),
            escape_markup(item.get_or_empty(fields::CONTENT)),
        );
        self.item = item;
    }
}

impl std::fmt::Debug for TweetCard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TweetCard")
            .field("id", &self.item.id)
            .field("avatar", &self.avatar)
            .field("markup", &self.markup)
            .finish()
    }
}

pub fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}
