mod price_cache;
mod spot_price;

pub use crate::model::price_cache::PriceCache;
pub use crate::model::spot_price::{truncate_to_hour, SpotPrice};
