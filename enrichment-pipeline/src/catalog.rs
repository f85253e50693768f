use std::collections::HashMap;

/// Read-only `game_id -> title` table, built once at startup.
#[derive(Debug, Clone)]
pub struct GameCatalog {
    titles: HashMap<i64, String>,
}

impl GameCatalog {
    pub fn new(titles: impl IntoIterator<Item = (i64, String)>) -> Self {
        Self {
            titles: titles.into_iter().collect(),
        }
    }

    pub fn title(&self, game_id: i64) -> Option<&str> {
        self.titles.get(&game_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

impl Default for GameCatalog {
    fn default() -> Self {
        Self::new(
            [
                (100, "Rocket Dice"),
                (101, "It's bananas!"),
                (102, "Wild Spin"),
                (103, "Book of Dead"),
                (104, "Pirate Jackpots"),
                (105, "Western Gold 2"),
                (106, "Super Rainbow Megaways"),
                (107, "#BarsAndBells"),
                (108, "Fortune Three"),
                (109, "ChilliPop"),
            ]
            .map(|(id, title)| (id, title.to_string())),
        )
    }
}
