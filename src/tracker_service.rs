use crate::config::{self, ConfigError};
use crate::model::{truncate_to_hour, PriceCache};
use crate::price_tracker::PriceTracker;
use crate::spot_price_client::SpotPriceClient;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::error::Error;
use tracing::{debug, info, warn};

pub struct TrackerServiceConfig {
    pub area: String,
    pub time_zone: Tz,
    pub fetch_time: NaiveTime,
    pub check_interval_minutes: u32,
}

impl TrackerServiceConfig {
    pub fn new(
        area: String,
        time_zone: Tz,
        fetch_time: NaiveTime,
        check_interval_minutes: u32,
    ) -> Result<Self, ConfigError> {
        debug!(
            "TrackerServiceConfig::new(area: {}, time_zone: {}, fetch_time: {}, check_interval_minutes: {})",
            area, time_zone, fetch_time, check_interval_minutes
        );

        // Check cycles stay aligned to the same in-hour boundaries only when
        // the interval divides the hour.
        if check_interval_minutes == 0
            || check_interval_minutes > 60
            || 60 % check_interval_minutes != 0
        {
            return Err(ConfigError::InvalidValue {
                variable: "CHECK_INTERVAL_MINUTES",
                message: format!("{} does not divide an hour", check_interval_minutes),
            });
        }

        Ok(Self {
            area,
            time_zone,
            fetch_time,
            check_interval_minutes,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let area = config::optional_var("PRICE_AREA", "FI");

        let time_zone_raw = config::optional_var("TIME_ZONE", "Europe/Helsinki");
        let time_zone = time_zone_raw
            .parse::<Tz>()
            .map_err(|e| ConfigError::InvalidValue {
                variable: "TIME_ZONE",
                message: e,
            })?;

        let fetch_time_raw = config::optional_var("FETCH_TIME", "13:15");
        let fetch_time = NaiveTime::parse_from_str(&fetch_time_raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&fetch_time_raw, "%H:%M:%S"))
            .map_err(|e| ConfigError::InvalidValue {
                variable: "FETCH_TIME",
                message: e.to_string(),
            })?;

        let check_interval_minutes = config::parse_var("CHECK_INTERVAL_MINUTES", 15)?;

        Self::new(area, time_zone, fetch_time, check_interval_minutes)
    }
}

/// Next in-hour check boundary strictly after `now` (:00/:15/:30/:45 for the
/// default 15 minute interval).
pub fn next_check_time(now: DateTime<Utc>, interval_minutes: u32) -> DateTime<Utc> {
    let hour = truncate_to_hour(now);
    let next_slot = (now.minute() / interval_minutes + 1) * interval_minutes;

    hour + Duration::minutes(next_slot as i64)
}

/// Next occurrence of the daily fetch time, interpreted in the market
/// timezone. A fetch time skipped by a DST transition rolls over to the next
/// day; an ambiguous one resolves to its earliest mapping.
pub fn next_fetch_time(now: DateTime<Utc>, time_zone: Tz, fetch_time: NaiveTime) -> DateTime<Utc> {
    let local_now = now.with_timezone(&time_zone);
    let mut date = local_now.date_naive();

    for _ in 0..3 {
        if let Some(candidate) = time_zone
            .from_local_datetime(&date.and_time(fetch_time))
            .earliest()
        {
            if candidate > local_now {
                return candidate.with_timezone(&Utc);
            }
        }
        date = match date.succ_opt() {
            Some(next_date) => next_date,
            None => break,
        };
    }

    now + Duration::days(1)
}

/// Owns the long-running loop: a daily fetch job that refreshes the price
/// cache and a sub-hourly check job that drives the price tracker. Both jobs
/// run on this single task, so they can never overlap and the cache needs no
/// lock.
pub struct TrackerService {
    config: TrackerServiceConfig,
    spot_price_client: Box<dyn SpotPriceClient>,
    price_cache: PriceCache,
    price_tracker: PriceTracker,
}

impl TrackerService {
    pub fn new(
        config: TrackerServiceConfig,
        spot_price_client: Box<dyn SpotPriceClient>,
        price_tracker: PriceTracker,
    ) -> Self {
        Self {
            config,
            spot_price_client,
            price_cache: PriceCache::new(),
            price_tracker,
        }
    }

    pub fn price_cache(&self) -> &PriceCache {
        &self.price_cache
    }

    /// One fetch cycle: retrieve today's and tomorrow's market days (dates in
    /// the market timezone, cache keys in UTC) into a fresh cache and swap it
    /// in. A cycle that yields nothing leaves the previous window in place,
    /// so a transient provider failure never empties a valid cache.
    pub async fn fetch_prices(&mut self, now: DateTime<Utc>) {
        info!("Fetching spot prices for area {}", self.config.area);

        let today = now.with_timezone(&self.config.time_zone).date_naive();
        let tomorrow = match today.succ_opt() {
            Some(date) => date,
            None => today,
        };

        let mut fresh_cache = PriceCache::new();
        for date in [today, tomorrow] {
            match self
                .spot_price_client
                .get_spot_prices(&self.config.area, date)
                .await
            {
                Ok(spot_prices) => fresh_cache.extend(spot_prices),
                Err(e) => warn!("Fetching spot prices for {} failed: {}", date, e),
            }
        }

        if fresh_cache.is_empty() {
            warn!(
                "Fetch cycle produced no prices; keeping {} previously cached hourly prices",
                self.price_cache.len()
            );
        } else {
            info!("Cached {} hourly prices", fresh_cache.len());
            self.price_cache = fresh_cache;
        }
    }

    /// Runs both jobs once synchronously, then loops on the recurring
    /// schedule until interrupted.
    pub async fn run(&mut self) -> Result<(), Box<dyn Error>> {
        info!(
            "Starting spot price tracker for area {} (fetch daily at {} {}, check every {} minutes)",
            self.config.area,
            self.config.fetch_time,
            self.config.time_zone,
            self.config.check_interval_minutes
        );

        self.fetch_prices(Utc::now()).await;
        self.price_tracker
            .check_current_price(&self.price_cache, Utc::now())
            .await;

        loop {
            let now = Utc::now();
            let next_fetch = next_fetch_time(now, self.config.time_zone, self.config.fetch_time);
            let next_check = next_check_time(now, self.config.check_interval_minutes);
            let deadline = next_fetch.min(next_check);
            let sleep_for = (deadline - now)
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);

            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {
                    let now = Utc::now();
                    if deadline == next_fetch {
                        self.fetch_prices(now).await;
                    }
                    if deadline == next_check {
                        self.price_tracker.check_current_price(&self.price_cache, now).await;
                    }
                }
                interrupt = tokio::signal::ctrl_c() => {
                    interrupt?;
                    info!("Received interrupt; shutting down");
                    return Ok(());
                }
            }
        }
    }
}
