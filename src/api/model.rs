// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use clap::ValueEnum;
use inflector::Inflector as _;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull, VecSkipError};
use tabled::Tabled;

use crate::session::{display_optional, Role, User};

fn display_option<T: std::fmt::Display>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

fn display_money(value: &f64) -> String {
    format!("{value:.0}")
}

fn display_list(values: &[String]) -> String {
    values.join(", ")
}

fn display_yes_no(value: &bool) -> String {
    if *value { "yes" } else { "no" }.to_owned()
}

/// A JSON array whose malformed elements are dropped instead of failing the
/// whole response.
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(transparent, bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct Lenient<T>(#[serde_as(as = "VecSkipError<_>")] pub(crate) Vec<T>);

impl<T> From<Lenient<T>> for Vec<T> {
    fn from(value: Lenient<T>) -> Self {
        value.0
    }
}

#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub(crate) username: &'a str,
    pub(crate) password: &'a str,
}

#[derive(Serialize)]
pub(crate) struct RegisterRequest<'a> {
    pub(crate) username: &'a str,
    pub(crate) email: &'a str,
    pub(crate) password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct VerifyEmailRequest<'a> {
    pub(crate) email: &'a str,
    pub(crate) code: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResendCodeRequest<'a> {
    pub(crate) email: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthResponse {
    pub(crate) access_token: String,
    pub(crate) user: User,
}

/// The body of most failed responses, and of some successful ones.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct MessageResponse {
    #[serde(default)]
    pub(crate) message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Ack {
    #[serde(default)]
    pub(crate) ok: bool,
    #[serde(default)]
    pub(crate) message: Option<String>,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Tabled)]
pub(crate) struct Club {
    #[tabled(rename = "ID")]
    pub(crate) id: u64,
    #[tabled(rename = "Name")]
    pub(crate) name: String,
    #[serde(default)]
    #[tabled(rename = "Address")]
    pub(crate) address: String,
    #[serde(rename = "isOpen", default)]
    #[tabled(rename = "Open", display_with = "display_yes_no")]
    pub(crate) is_open: bool,
    #[serde(rename = "pcsFree", default)]
    #[tabled(rename = "Free PCs")]
    pub(crate) pcs_free: u32,
    #[serde(rename = "pcsTotal", default)]
    #[tabled(rename = "Total PCs")]
    pub(crate) pcs_total: u32,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    #[tabled(rename = "Rating")]
    pub(crate) rating: f64,
    #[serde(rename = "pricePerHour", default)]
    #[tabled(rename = "Price/h", display_with = "display_option")]
    pub(crate) price_per_hour: Option<f64>,
    #[serde(default)]
    #[tabled(skip)]
    pub(crate) working_hours: Option<String>,
    #[serde(default)]
    #[tabled(skip)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    #[tabled(skip)]
    pub(crate) lat: Option<f64>,
    #[serde(default)]
    #[tabled(skip)]
    pub(crate) lng: Option<f64>,
}

#[derive(Clone, Debug, Deserialize, Tabled)]
pub(crate) struct Zone {
    #[tabled(rename = "Zone")]
    pub(crate) name: String,
    #[serde(default)]
    #[tabled(rename = "Price", display_with = "display_optional")]
    pub(crate) price: Option<String>,
    #[serde(default)]
    #[tabled(rename = "Specs", display_with = "display_optional")]
    pub(crate) specs: Option<String>,
    #[serde(default)]
    #[tabled(rename = "Capacity", display_with = "display_optional")]
    pub(crate) capacity: Option<String>,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ClubDetail {
    #[serde(flatten)]
    pub(crate) club: Club,
    #[serde_as(as = "DefaultOnNull<VecSkipError<_>>")]
    #[serde(default)]
    pub(crate) zones: Vec<Zone>,
}

impl ClubDetail {
    /// The zone matching `name` case-insensitively, or the first zone.
    pub(crate) fn pick_zone(&self, name: Option<&str>) -> Option<&Zone> {
        name.and_then(|wanted| {
            self.zones
                .iter()
                .find(|zone| zone.name.to_lowercase() == wanted.trim().to_lowercase())
        })
        .or_else(|| self.zones.first())
    }
}

#[derive(Clone, Debug, Deserialize, Tabled)]
pub(crate) struct Review {
    #[tabled(rename = "ID")]
    pub(crate) id: u64,
    #[serde(default)]
    #[tabled(skip)]
    pub(crate) user_id: Option<u64>,
    #[tabled(rename = "User")]
    pub(crate) username: String,
    #[tabled(rename = "Rating")]
    pub(crate) rating: u8,
    #[serde(default)]
    #[tabled(rename = "Review")]
    pub(crate) text: String,
    #[serde(default)]
    #[tabled(rename = "Posted", display_with = "display_optional")]
    pub(crate) created_at: Option<String>,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ReviewList {
    #[serde(default)]
    pub(crate) average_rating: f64,
    #[serde(default)]
    pub(crate) rating_count: u64,
    #[serde_as(as = "DefaultOnNull<VecSkipError<_>>")]
    #[serde(default)]
    pub(crate) reviews: Vec<Review>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum PcStatus {
    Free,
    Busy,
    Offline,
    #[serde(other)]
    #[value(skip)]
    Unknown,
}

impl std::fmt::Display for PcStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_possible_value() {
            Some(value) => write!(f, "{}", value.get_name().to_title_case()),
            None => write!(f, "Unknown"),
        }
    }
}

/// PC identifiers arrive as numbers from some endpoints and strings from
/// others.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum PcId {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for PcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Tabled)]
pub(crate) struct ZonePc {
    #[tabled(rename = "ID")]
    pub(crate) id: PcId,
    #[tabled(rename = "PC")]
    pub(crate) name: String,
    #[tabled(rename = "Status")]
    pub(crate) status: PcStatus,
}

#[serde_as]
#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct ZonePcs {
    #[serde_as(as = "DefaultOnNull<VecSkipError<_>>")]
    #[serde(default)]
    pub(crate) pcs: Vec<ZonePc>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    #[serde(other)]
    #[value(skip)]
    Unknown,
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_possible_value() {
            Some(value) => write!(f, "{}", value.get_name().to_title_case()),
            None => write!(f, "Unknown"),
        }
    }
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Tabled)]
pub(crate) struct Booking {
    #[tabled(rename = "ID")]
    pub(crate) id: u64,
    #[serde(default)]
    #[tabled(rename = "Club", display_with = "display_optional")]
    pub(crate) club_name: Option<String>,
    #[serde(default)]
    #[tabled(rename = "Zone")]
    pub(crate) zone_name: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    #[tabled(rename = "PCs", display_with = "display_list")]
    pub(crate) pc_names: Vec<String>,
    #[serde(default)]
    #[tabled(rename = "Duration", display_with = "display_optional")]
    pub(crate) duration: Option<String>,
    #[serde(default = "BookingStatus::unknown")]
    #[tabled(rename = "Status")]
    pub(crate) status: BookingStatus,
    #[serde(default)]
    #[tabled(rename = "Client", display_with = "display_optional")]
    pub(crate) client_name: Option<String>,
    #[serde(default)]
    #[tabled(rename = "Phone", display_with = "display_optional")]
    pub(crate) phone: Option<String>,
    #[serde(default)]
    #[tabled(rename = "Created", display_with = "display_optional")]
    pub(crate) created_at: Option<String>,
}

impl BookingStatus {
    const fn unknown() -> Self {
        Self::Unknown
    }
}

/// Booking lists come either bare or wrapped in an object.
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum BookingList {
    Wrapped {
        #[serde_as(as = "VecSkipError<_>")]
        bookings: Vec<Booking>,
    },
    Bare(#[serde_as(as = "VecSkipError<_>")] Vec<Booking>),
}

impl From<BookingList> for Vec<Booking> {
    fn from(value: BookingList) -> Self {
        match value {
            BookingList::Wrapped { bookings } | BookingList::Bare(bookings) => bookings,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BookingCreated {
    #[serde(default)]
    pub(crate) booking: Option<Booking>,
    #[serde(default)]
    pub(crate) message: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BookingStatusUpdate {
    pub(crate) status: BookingStatus,
}

#[derive(Clone, Debug, Deserialize, Tabled)]
pub(crate) struct PaymentAmount {
    #[tabled(rename = "Method")]
    pub(crate) name: String,
    #[tabled(rename = "Amount", display_with = "display_money")]
    pub(crate) amount: f64,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct Overview {
    pub(crate) today_revenue: f64,
    pub(crate) week_revenue: f64,
    pub(crate) total_members: u64,
    pub(crate) active_pcs: u32,
    pub(crate) total_pcs: u32,
    pub(crate) pc_load_percent: f64,
    #[serde_as(as = "DefaultOnNull<VecSkipError<_>>")]
    #[serde(default)]
    pub(crate) payment_methods: Vec<PaymentAmount>,
    #[serde(default)]
    pub(crate) api_connected: bool,
}

#[derive(Clone, Debug, Deserialize, Tabled)]
pub(crate) struct DailyPoint {
    #[tabled(rename = "Day")]
    pub(crate) day: String,
    #[tabled(rename = "Date")]
    pub(crate) date: String,
    #[tabled(rename = "Income", display_with = "display_money")]
    pub(crate) value: f64,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct DailyChart {
    #[serde_as(as = "DefaultOnNull<VecSkipError<_>>")]
    #[serde(default)]
    pub(crate) days: Vec<DailyPoint>,
    #[serde(default)]
    pub(crate) total: f64,
}

#[derive(Clone, Debug, Deserialize, Tabled)]
pub(crate) struct MonthlyPoint {
    #[tabled(rename = "Date")]
    pub(crate) date: String,
    #[tabled(rename = "Cash", display_with = "display_money")]
    pub(crate) cash: f64,
    #[tabled(rename = "Balance", display_with = "display_money")]
    pub(crate) balance: f64,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct MonthlyChart {
    #[serde_as(as = "DefaultOnNull<VecSkipError<_>>")]
    #[serde(default)]
    pub(crate) points: Vec<MonthlyPoint>,
    #[serde(default)]
    pub(crate) total_cash: f64,
    #[serde(default)]
    pub(crate) total_balance: f64,
}

#[derive(Clone, Debug, Deserialize, Tabled)]
pub(crate) struct PaymentShare {
    #[tabled(rename = "Method")]
    pub(crate) name: String,
    #[tabled(rename = "Amount", display_with = "display_money")]
    pub(crate) amount: f64,
    #[tabled(rename = "%")]
    pub(crate) percent: f64,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct PaymentMethods {
    #[serde_as(as = "DefaultOnNull<VecSkipError<_>>")]
    #[serde(default)]
    pub(crate) methods: Vec<PaymentShare>,
}

#[derive(Clone, Debug, Deserialize, Tabled)]
pub(crate) struct IncomeMonth {
    #[tabled(rename = "Month")]
    pub(crate) month: String,
    #[tabled(rename = "Income", display_with = "display_money")]
    pub(crate) total: f64,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct MonthlyIncome {
    #[serde_as(as = "DefaultOnNull<VecSkipError<_>>")]
    #[serde(default)]
    pub(crate) months: Vec<IncomeMonth>,
    #[serde(default)]
    pub(crate) total: f64,
}

#[derive(Clone, Debug, Deserialize, Tabled)]
pub(crate) struct Pc {
    #[tabled(rename = "ID")]
    pub(crate) id: PcId,
    #[tabled(rename = "PC")]
    pub(crate) name: String,
    #[tabled(rename = "Status")]
    pub(crate) status: PcStatus,
    #[serde(default)]
    #[tabled(rename = "Member")]
    pub(crate) member: String,
    #[serde(default)]
    #[tabled(rename = "Time Left")]
    pub(crate) time_left: String,
    #[serde(default)]
    #[tabled(rename = "Room")]
    pub(crate) room: String,
}

#[serde_as]
#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct PcList {
    #[serde_as(as = "DefaultOnNull<VecSkipError<_>>")]
    #[serde(default)]
    pub(crate) pcs: Vec<Pc>,
    #[serde(default)]
    pub(crate) total: u32,
}

#[derive(Clone, Debug, Deserialize, Tabled)]
pub(crate) struct Member {
    #[tabled(rename = "ID")]
    pub(crate) id: u64,
    #[tabled(rename = "Account")]
    pub(crate) account: String,
    #[serde(default)]
    #[tabled(rename = "Name")]
    pub(crate) name: String,
    #[serde(default)]
    #[tabled(rename = "Balance", display_with = "display_money")]
    pub(crate) balance: f64,
    #[serde(default)]
    #[tabled(rename = "Bonus", display_with = "display_money")]
    pub(crate) balance_bonus: f64,
    #[serde(default)]
    #[tabled(rename = "Points")]
    pub(crate) points: i64,
    #[serde(default)]
    #[tabled(rename = "Group")]
    pub(crate) group: String,
    #[serde(default)]
    #[tabled(rename = "Online", display_with = "display_yes_no")]
    pub(crate) is_logined: bool,
    #[serde(default)]
    #[tabled(skip)]
    pub(crate) is_active: bool,
    #[serde(default)]
    #[tabled(rename = "Expires")]
    pub(crate) expire: String,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct MembersPage {
    #[serde_as(as = "DefaultOnNull<VecSkipError<_>>")]
    #[serde(default)]
    pub(crate) members: Vec<Member>,
    #[serde(default)]
    pub(crate) paging: BTreeMap<String, i64>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ConfigData {
    #[serde(default)]
    pub(crate) cafe_id: String,
    #[serde(default)]
    pub(crate) api_key_masked: String,
    #[serde(default)]
    pub(crate) configured: bool,
    #[serde(default)]
    pub(crate) club_name: String,
    #[serde(default)]
    pub(crate) club_logo_url: String,
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct ConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) cafe_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) club_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) club_logo_url: Option<String>,
}

impl ConfigUpdate {
    pub(crate) const fn is_empty(&self) -> bool {
        self.api_key.is_none()
            && self.cafe_id.is_none()
            && self.club_name.is_none()
            && self.club_logo_url.is_none()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadedLogo {
    pub(crate) url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Health {
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) configured: bool,
    #[serde(default)]
    pub(crate) timestamp: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Tabled)]
pub(crate) struct AdminClub {
    #[tabled(rename = "ID")]
    pub(crate) id: u64,
    #[tabled(rename = "Name")]
    pub(crate) name: String,
    #[serde(default)]
    #[tabled(rename = "Address", display_with = "display_optional")]
    pub(crate) address: Option<String>,
    #[serde(default)]
    #[tabled(rename = "Cafe ID", display_with = "display_optional")]
    pub(crate) cafe_id: Option<String>,
    #[serde(default)]
    #[tabled(rename = "Manager", display_with = "display_optional")]
    pub(crate) manager: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct ClubChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) cafe_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) api_key: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Tabled)]
pub(crate) struct AdminUser {
    #[tabled(rename = "ID")]
    pub(crate) id: u64,
    #[tabled(rename = "Username")]
    pub(crate) username: String,
    #[tabled(rename = "Role")]
    pub(crate) role: Role,
    #[serde(default)]
    #[tabled(rename = "Club ID", display_with = "display_option")]
    pub(crate) club_id: Option<u64>,
    #[serde(default)]
    #[tabled(rename = "Club", display_with = "display_optional")]
    pub(crate) club_name: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct UserChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) club_id: Option<u64>,
}

#[derive(Serialize)]
pub(crate) struct AssignUser<'a> {
    pub(crate) username: &'a str,
    pub(crate) password: &'a str,
    pub(crate) club_id: u64,
    pub(crate) role: Role,
}
