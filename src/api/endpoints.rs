// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use serde_json::json;

use super::{model::*, ApiClient};
use crate::{
    booking::BookingRequest,
    error::Result,
    profile::App,
    session::{Role, Session, User},
};

const MEMBERS_PAGE_PARAM: &str = "page";
const MEMBERS_SEARCH_PARAM: &str = "search";

impl ApiClient {
    async fn establish(&self, auth: AuthResponse) -> Result<User> {
        let session = Session::new(auth.access_token, auth.user)?;
        let user = session.user().clone();
        self.store().login(session).await;
        Ok(user)
    }

    /// Exchange a username and password for a session and make it current.
    pub(crate) async fn login(&self, app: App, username: &str, password: &str) -> Result<User> {
        let auth: AuthResponse = self
            .post_credentials(app.login_endpoint(), &LoginRequest { username, password })
            .await?;
        self.establish(auth).await
    }

    pub(crate) async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<MessageResponse> {
        self.post_credentials(
            "/api/clients/register",
            &RegisterRequest {
                username,
                email,
                password,
            },
        )
        .await
    }

    /// Confirm an email address. The server answers with a fresh session.
    pub(crate) async fn verify_email(&self, email: &str, code: &str) -> Result<User> {
        let auth: AuthResponse = self
            .post_credentials("/api/auth/verify-email", &VerifyEmailRequest { email, code })
            .await?;
        self.establish(auth).await
    }

    pub(crate) async fn resend_code(&self, email: &str) -> Result<MessageResponse> {
        self.post_credentials("/api/auth/resend-code", &ResendCodeRequest { email })
            .await
    }

    pub(crate) async fn clubs(&self) -> Result<Vec<Club>> {
        self.get::<Lenient<Club>>("/api/public/clubs", &[])
            .await
            .map(Vec::from)
    }

    pub(crate) async fn club(&self, id: u64) -> Result<ClubDetail> {
        self.get(&format!("/api/public/clubs/{id}"), &[]).await
    }

    pub(crate) async fn club_reviews(&self, id: u64) -> Result<ReviewList> {
        self.get(&format!("/api/public/clubs/{id}/reviews"), &[])
            .await
    }

    pub(crate) async fn zone_pcs(&self, club: u64, zone: &str) -> Result<ZonePcs> {
        self.get(
            &format!("/api/public/clubs/{club}/zone-pcs"),
            &[("zone_name", zone.to_owned())],
        )
        .await
    }

    pub(crate) async fn create_booking(
        &self,
        club: u64,
        booking: &BookingRequest,
    ) -> Result<BookingCreated> {
        self.post(&format!("/api/public/clubs/{club}/bookings"), booking)
            .await
    }

    pub(crate) async fn my_bookings(&self) -> Result<Vec<Booking>> {
        self.get::<BookingList>("/api/public/bookings/my", &[])
            .await
            .map(Vec::from)
    }

    pub(crate) async fn cancel_booking(&self, id: u64) -> Result<MessageResponse> {
        self.put(&format!("/api/public/bookings/{id}/cancel"), &json!({}))
            .await
    }

    pub(crate) async fn overview(&self) -> Result<Overview> {
        self.get("/api/overview", &[]).await
    }

    pub(crate) async fn daily_chart(&self) -> Result<DailyChart> {
        self.get("/api/charts/daily", &[]).await
    }

    pub(crate) async fn monthly_chart(&self) -> Result<MonthlyChart> {
        self.get("/api/charts/monthly", &[]).await
    }

    pub(crate) async fn payment_methods(&self) -> Result<PaymentMethods> {
        self.get("/api/charts/payments", &[]).await
    }

    pub(crate) async fn monthly_income(&self) -> Result<MonthlyIncome> {
        self.get("/api/charts/income-monthly", &[]).await
    }

    pub(crate) async fn pcs(&self) -> Result<PcList> {
        self.get("/api/pcs", &[]).await
    }

    pub(crate) async fn members(&self, page: u32, search: &str) -> Result<MembersPage> {
        self.get(
            "/api/members",
            &[
                (MEMBERS_PAGE_PARAM, page.to_string()),
                (MEMBERS_SEARCH_PARAM, search.to_owned()),
            ],
        )
        .await
    }

    pub(crate) async fn config(&self) -> Result<ConfigData> {
        self.get("/api/config", &[]).await
    }

    pub(crate) async fn save_config(&self, update: &ConfigUpdate) -> Result<Ack> {
        self.post("/api/config", update).await
    }

    pub(crate) async fn upload_logo(&self, file: PathBuf) -> Result<UploadedLogo> {
        self.upload("/api/upload-logo", file).await
    }

    pub(crate) async fn health(&self) -> Result<Health> {
        self.get("/api/health", &[]).await
    }

    pub(crate) async fn club_bookings(&self) -> Result<Vec<Booking>> {
        self.get::<BookingList>("/api/manager/bookings", &[])
            .await
            .map(Vec::from)
    }

    pub(crate) async fn set_booking_status(
        &self,
        id: u64,
        status: BookingStatus,
    ) -> Result<MessageResponse> {
        self.put(
            &format!("/api/manager/bookings/{id}/status"),
            &BookingStatusUpdate { status },
        )
        .await
    }

    pub(crate) async fn club_reviews_for_manager(&self) -> Result<ReviewList> {
        self.get("/api/manager/reviews", &[]).await
    }

    pub(crate) async fn admin_clubs(&self) -> Result<Vec<AdminClub>> {
        self.get::<Lenient<AdminClub>>("/api/admin/clubs", &[])
            .await
            .map(Vec::from)
    }

    pub(crate) async fn create_club(&self, club: &ClubChanges) -> Result<AdminClub> {
        self.post("/api/admin/clubs", club).await
    }

    pub(crate) async fn update_club(&self, id: u64, changes: &ClubChanges) -> Result<AdminClub> {
        self.put(&format!("/api/admin/clubs/{id}"), changes).await
    }

    pub(crate) async fn admin_users(&self) -> Result<Vec<AdminUser>> {
        self.get::<Lenient<AdminUser>>("/api/admin/users", &[])
            .await
            .map(Vec::from)
    }

    pub(crate) async fn update_user(&self, id: u64, changes: &UserChanges) -> Result<AdminUser> {
        self.put(&format!("/api/admin/users/{id}"), changes).await
    }

    pub(crate) async fn delete_user(&self, id: u64) -> Result<MessageResponse> {
        self.delete::<Option<MessageResponse>>(&format!("/api/admin/users/{id}"))
            .await
            .map(Option::unwrap_or_default)
    }

    pub(crate) async fn assign_user(
        &self,
        username: &str,
        password: &str,
        club_id: u64,
        role: Role,
    ) -> Result<MessageResponse> {
        self.post(
            "/api/admin/assign-user",
            &AssignUser {
                username,
                password,
                club_id,
                role,
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;

    use super::*;
    use crate::{api::client::testing::client, booking::Duration};

    const ALICE: &str = r#"{
        "access_token": "abc123",
        "user": {"id": 7, "username": "alice", "role": "client", "email": "alice@example.com"}
    }"#;

    #[tokio::test]
    async fn login_then_bookings_carry_the_token() -> Result<()> {
        let (client, transport) = client(App::Client).await;
        transport
            .respond(Method::POST, "/api/clients/login", 200, ALICE)
            .await;
        transport
            .respond(Method::GET, "/api/public/bookings/my", 200, r#"{"bookings": []}"#)
            .await;

        let user = client.login(App::Client, "alice", "secret").await?;
        assert_eq!(user.username, "alice");
        assert_eq!(user.role, Role::Member);
        assert!(client.store().is_authenticated());

        assert!(client.my_bookings().await?.is_empty());

        let recorded = transport.recorded().await;
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].bearer, None);
        assert_eq!(
            recorded[0].body,
            Some(json!({"username": "alice", "password": "secret"}))
        );
        assert_eq!(recorded[1].path, "/api/public/bookings/my");
        assert_eq!(recorded[1].bearer.as_deref(), Some("abc123"));
        Ok(())
    }

    #[tokio::test]
    async fn manager_login_uses_its_own_endpoint() -> Result<()> {
        let (client, transport) = client(App::Manager).await;
        transport
            .respond(
                Method::POST,
                "/api/auth/login",
                200,
                r#"{"access_token": "m-1", "user": {"id": 1, "username": "boss", "role": "manager"}}"#,
            )
            .await;

        let user = client.login(App::Manager, "boss", "secret").await?;
        assert_eq!(user.role, Role::Manager);
        assert!(client.store().is_manager());
        Ok(())
    }

    #[tokio::test]
    async fn failed_login_stays_anonymous() -> Result<()> {
        let (client, transport) = client(App::Client).await;
        transport
            .respond(
                Method::POST,
                "/api/clients/login",
                401,
                r#"{"message": "Wrong password"}"#,
            )
            .await;

        let err = client
            .login(App::Client, "alice", "nope")
            .await
            .err()
            .ok_or(crate::error::Error::Command)?;
        assert!(!err.is_authentication_rejected());
        assert!(err.to_string().contains("Wrong password"));
        assert!(!client.store().is_authenticated());
        Ok(())
    }

    #[tokio::test]
    async fn verification_logs_in() -> Result<()> {
        let (client, transport) = client(App::Client).await;
        transport
            .respond(Method::POST, "/api/auth/verify-email", 200, ALICE)
            .await;

        let user = client.verify_email("alice@example.com", "123456").await?;
        assert_eq!(user.id, 7);
        assert!(client.store().is_authenticated());
        Ok(())
    }

    #[tokio::test]
    async fn zone_pcs_sends_the_zone_name() -> Result<()> {
        let (client, transport) = client(App::Client).await;
        transport
            .respond(
                Method::GET,
                "/api/public/clubs/3/zone-pcs",
                200,
                r#"{"pcs": [{"id": 1, "name": "PC-01", "status": "free"}]}"#,
            )
            .await;

        let pcs = client.zone_pcs(3, "VIP Room").await?;
        assert_eq!(pcs.pcs.len(), 1);
        let recorded = transport.recorded().await;
        assert_eq!(recorded[0].query.as_deref(), Some("zone_name=VIP+Room"));
        Ok(())
    }

    #[tokio::test]
    async fn booking_posts_the_validated_request() -> Result<()> {
        let (client, transport) = client(App::Client).await;
        transport
            .respond(
                Method::POST,
                "/api/public/clubs/3/bookings",
                201,
                r#"{"message": "Booked", "booking": {"id": 11, "zone_name": "VIP", "pc_names": ["PC-01"], "status": "pending"}}"#,
            )
            .await;

        let request = BookingRequest::new(
            "Alice",
            "123",
            "VIP",
            Duration::OneHour,
            vec!["PC-01".to_owned()],
        )?;
        let created = client.create_booking(3, &request).await?;
        assert_eq!(created.booking.map(|b| b.id), Some(11));

        let recorded = transport.recorded().await;
        assert_eq!(
            recorded[0].body.as_ref().and_then(|b| b.get("duration").cloned()),
            Some(json!("1 час"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn members_sends_page_and_search() -> Result<()> {
        let (client, transport) = client(App::Manager).await;
        transport
            .respond(
                Method::GET,
                "/api/members",
                200,
                r#"{"members": [], "paging": {"page": 2, "pages": 5}}"#,
            )
            .await;

        let page = client.members(2, "bob").await?;
        assert_eq!(page.paging.get("pages"), Some(&5));
        let recorded = transport.recorded().await;
        assert_eq!(recorded[0].query.as_deref(), Some("page=2&search=bob"));
        Ok(())
    }

    #[tokio::test]
    async fn deleting_a_user_tolerates_an_empty_body() -> Result<()> {
        let (client, transport) = client(App::Manager).await;
        transport
            .respond(Method::DELETE, "/api/admin/users/4", 204, "")
            .await;

        let response = client.delete_user(4).await?;
        assert_eq!(response.message, None);
        Ok(())
    }
}
