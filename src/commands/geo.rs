//! GEO command handlers.
//!
//! `GEORADIUS`, `GEORADIUSBYMEMBER` and `GEODIST` parse their arguments here,
//! hand a [`RadialQuery`] or a member pair to the [`GeoService`], and shape the
//! matches into Redis-style replies. All distances and coordinates go out as
//! bulk strings with six decimals.

use crate::commands::handler::{call_with_retry, error_reply, wrong_arity, CommandContext, Reply};
use crate::geo::{DistanceUnit, GeoMatch, LatLng, RadialQuery, SearchCenter, SortType};
use crate::protocol::{Command, ReplyValue};
use crate::storage::BackendError;
use bytes::Bytes;
use tracing::warn;

/// Radius used when the radius argument does not parse.
pub const DEFAULT_RADIUS: f64 = 100.0;

/// Options shared by the two radius commands.
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusOptions {
    /// Radius in `unit`.
    pub radius: f64,
    pub unit: DistanceUnit,
    pub with_coord: bool,
    pub with_dist: bool,
    pub with_value: bool,
    pub count: Option<usize>,
    pub sort: SortType,
}

impl Default for RadiusOptions {
    fn default() -> Self {
        Self {
            radius: DEFAULT_RADIUS,
            unit: DistanceUnit::Meters,
            with_coord: false,
            with_dist: false,
            with_value: false,
            count: None,
            sort: SortType::Random,
        }
    }
}

impl RadiusOptions {
    /// Parses `radius [unit] [WITHCOORD] [WITHDIST] [WITHVALUE] [COUNT n] [ASC|DESC]`
    /// starting at `args[start]`.
    ///
    /// Nothing here is fatal. A bad radius falls back to [`DEFAULT_RADIUS`],
    /// an unrecognised unit token is reparsed as an option, and unknown
    /// options are skipped.
    pub fn parse(args: &[Bytes], start: usize) -> Self {
        let mut options = RadiusOptions::default();
        let mut i = start;

        let Some(radius) = args.get(i) else {
            return options;
        };
        match parse_f64(radius) {
            Some(r) => options.radius = r,
            None => warn!(
                radius = %String::from_utf8_lossy(radius),
                "invalid radius, using default {}", DEFAULT_RADIUS
            ),
        }
        i += 1;

        if let Some(unit) = args.get(i).and_then(|arg| DistanceUnit::parse(arg)) {
            options.unit = unit;
            i += 1;
        }

        while i < args.len() {
            let arg = &args[i];
            if arg.eq_ignore_ascii_case(b"WITHCOORD") {
                options.with_coord = true;
            } else if arg.eq_ignore_ascii_case(b"WITHDIST") {
                options.with_dist = true;
            } else if arg.eq_ignore_ascii_case(b"WITHVALUE") {
                options.with_value = true;
            } else if arg.eq_ignore_ascii_case(b"ASC") {
                options.sort = SortType::Asc;
            } else if arg.eq_ignore_ascii_case(b"DESC") {
                options.sort = SortType::Desc;
            } else if arg.eq_ignore_ascii_case(b"COUNT") {
                match args.get(i + 1) {
                    Some(n) => {
                        match parse_i64(n) {
                            Some(n) if n > 0 => options.count = Some(n as usize),
                            _ => warn!(
                                count = %String::from_utf8_lossy(n),
                                "invalid COUNT, ignored"
                            ),
                        }
                        i += 1;
                    }
                    None => warn!("COUNT without a value, ignored"),
                }
            } else {
                warn!(
                    option = %String::from_utf8_lossy(arg),
                    "unsupported GEO option, ignored"
                );
            }
            i += 1;
        }

        options
    }

    pub fn radius_meters(&self) -> f64 {
        self.unit.to_meters(self.radius)
    }

    fn query(&self, center: SearchCenter) -> RadialQuery {
        RadialQuery {
            center,
            radius_m: self.radius_meters(),
            count: self.count,
            sort: self.sort,
        }
    }

    /// Shapes the matches. Without flags each entry is the bare member;
    /// otherwise `[member, dist?, [lng, lat]?, value?]`.
    pub fn compose(&self, matches: Vec<GeoMatch>) -> ReplyValue {
        let plain = !(self.with_coord || self.with_dist || self.with_value);
        let items = matches
            .into_iter()
            .map(|m| {
                if plain {
                    return ReplyValue::bulk_string(m.hash_key);
                }
                let mut item = Vec::with_capacity(4);
                item.push(ReplyValue::bulk_string(m.hash_key));
                if self.with_dist {
                    item.push(format_float(self.unit.from_meters(m.distance_m)));
                }
                if self.with_coord {
                    item.push(ReplyValue::array(vec![
                        format_float(m.lng_degrees),
                        format_float(m.lat_degrees),
                    ]));
                }
                if self.with_value {
                    item.push(ReplyValue::bulk_string(m.value));
                }
                ReplyValue::array(item)
            })
            .collect();
        ReplyValue::array(items)
    }
}

fn format_float(value: f64) -> ReplyValue {
    ReplyValue::bulk_string(Bytes::from(format!("{:.6}", value)))
}

fn parse_f64(arg: &[u8]) -> Option<f64> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}

fn parse_i64(arg: &[u8]) -> Option<i64> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}

fn coordinate(arg: &[u8], name: &'static str) -> f64 {
    parse_f64(arg).unwrap_or_else(|| {
        warn!(
            value = %String::from_utf8_lossy(arg),
            "invalid {}, using 0", name
        );
        0.0
    })
}

fn geo_disabled() -> Reply {
    Reply::Ready(ReplyValue::error("ERR geo extension is not enabled"))
}

fn search(ctx: &CommandContext, name: &'static str, options: RadiusOptions, center: SearchCenter) -> Reply {
    let Some(geo) = ctx.geo().cloned() else {
        return geo_disabled();
    };
    let proxy_options = ctx.options();
    let query = options.query(center);

    Reply::Pending(Box::pin(async move {
        let result = call_with_retry(proxy_options, || {
            let geo = geo.clone();
            let query = query.clone();
            async move { geo.search_radial(query).await }
        })
        .await;
        match result {
            Ok(matches) => options.compose(matches),
            Err(err) => error_reply(name, &err),
        }
    }))
}

/// GEORADIUS key longitude latitude radius [m|km|ft|mi] [WITHCOORD] [WITHDIST] [WITHVALUE] [COUNT count] [ASC|DESC]
///
/// The key argument is accepted for compatibility; the search covers every
/// indexed member.
pub fn cmd_georadius(ctx: &CommandContext, command: &Command) -> Reply {
    let args = command.args();
    if args.len() < 5 {
        return wrong_arity("GEORADIUS");
    }

    let lng = coordinate(&args[2], "longitude");
    let lat = coordinate(&args[3], "latitude");
    let options = RadiusOptions::parse(args, 4);
    search(
        ctx,
        "GEORADIUS",
        options,
        SearchCenter::LatLng(LatLng::new(lat, lng)),
    )
}

/// GEORADIUSBYMEMBER key member radius [m|km|ft|mi] [WITHCOORD] [WITHDIST] [WITHVALUE] [COUNT count] [ASC|DESC]
pub fn cmd_georadius_by_member(ctx: &CommandContext, command: &Command) -> Reply {
    let args = command.args();
    if args.len() < 4 {
        return wrong_arity("GEORADIUSBYMEMBER");
    }

    let options = RadiusOptions::parse(args, 3);
    search(
        ctx,
        "GEORADIUSBYMEMBER",
        options,
        SearchCenter::Member {
            hash_key: args[2].clone(),
            sort_key: Bytes::new(),
        },
    )
}

/// GEODIST key member1 member2 [m|km|ft|mi]
pub fn cmd_geodist(ctx: &CommandContext, command: &Command) -> Reply {
    let args = command.args();
    if args.len() < 4 {
        return wrong_arity("GEODIST");
    }
    let Some(geo) = ctx.geo().cloned() else {
        return geo_disabled();
    };

    let unit = match args.get(4) {
        Some(arg) => DistanceUnit::parse(arg).unwrap_or_else(|| {
            warn!(unit = %String::from_utf8_lossy(arg), "unknown unit, using meters");
            DistanceUnit::Meters
        }),
        None => DistanceUnit::Meters,
    };
    let member1 = args[2].clone();
    let member2 = args[3].clone();
    let options = ctx.options();

    Reply::Pending(Box::pin(async move {
        let result = call_with_retry(options, || {
            let geo = geo.clone();
            let (member1, member2) = (member1.clone(), member2.clone());
            async move {
                geo.distance(member1, Bytes::new(), member2, Bytes::new())
                    .await
            }
        })
        .await;
        match result {
            Ok(meters) => format_float(unit.from_meters(meters)),
            Err(BackendError::NotFound) => ReplyValue::error("ERR not found"),
            Err(err) => error_reply("GEODIST", &err),
        }
    }))
}
