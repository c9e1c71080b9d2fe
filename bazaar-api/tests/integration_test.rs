use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use bazaar_api::middleware::auth::issue_token;
use bazaar_api::{app, AppState, AuthConfig, Repositories};
use bazaar_core::{Account, NewUser, User};

struct TestApp {
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        let auth = AuthConfig { secret: "integration-secret".into(), expiration: 3600 };
        Self { state: AppState::new(Repositories::in_memory(), auth).unwrap() }
    }

    async fn user(&self, phone: &str, name: &str) -> (User, String) {
        let user = User::register(NewUser {
            phone: phone.into(),
            name: name.into(),
            email: None,
            country_code: "+977".into(),
            country: None,
        })
        .unwrap();
        self.state.accounts.create_user(&user).await.unwrap();
        let token = issue_token(&self.state.auth, &user).unwrap();
        (user, token)
    }

    async fn admin(&self) -> String {
        let (mut user, token) = self.user("9800000000", "Admin").await;
        user.is_admin = true;
        self.state.accounts.update_user(&user).await.unwrap();
        token
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app(self.state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, value)
    }

    async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(token), None).await
    }

    async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(token), Some(body)).await
    }
}

/// Money is serialized as a string; accept numbers too.
fn money(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().unwrap(),
        other => serde_json::from_value(other.clone()).unwrap(),
    }
}

fn id(value: &Value) -> String {
    value["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_and_metrics() {
    let t = TestApp::new();
    let (status, body) = t.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = t.call(Method::GET, "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_str().unwrap().contains("bazaar_http_responses_total"));
}

#[tokio::test]
async fn test_protected_routes_require_token_and_admin_flag() {
    let t = TestApp::new();
    let (status, body) = t.call(Method::GET, "/v1/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = t.call(Method::GET, "/v1/me", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, token) = t.user("9811111111", "Ram").await;
    let (status, _) = t.get("/v1/admin/settings", &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = t.admin().await;
    let (status, body) = t.get("/v1/admin/settings", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(money(&body["sales_commission"]), dec!(10));
}

#[tokio::test]
async fn test_otp_login_registers_new_user() {
    let t = TestApp::new();
    let phone = "9822222222";

    let (status, _) = t.call(Method::POST, "/v1/auth/otp/request", None, Some(json!({ "phone": phone }))).await;
    assert_eq!(status, StatusCode::OK);

    // Read the code the way an SMS gateway would see it, then put it back.
    let challenge = t.state.accounts.take_otp(phone).await.unwrap().unwrap();
    t.state.accounts.save_otp(&challenge).await.unwrap();

    let (status, _) = t
        .call(Method::POST, "/v1/auth/otp/verify", None, Some(json!({ "phone": phone, "code": challenge.code })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "new accounts need a name");

    let (status, _) = t
        .call(Method::POST, "/v1/auth/otp/verify", None, Some(json!({ "phone": phone, "code": "000000x" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = t
        .call(
            Method::POST,
            "/v1/auth/otp/verify",
            None,
            Some(json!({ "phone": phone, "code": challenge.code, "name": "Gita", "country_code": "+977" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_new"], true);
    assert_eq!(body["user"]["country"], "Nepal");
    let token = body["token"].as_str().unwrap().to_string();

    // The code is single use.
    let (status, _) = t
        .call(Method::POST, "/v1/auth/otp/verify", None, Some(json!({ "phone": phone, "code": challenge.code })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, me) = t.get("/v1/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["phone"], phone);
    assert_eq!(me["travel_role"], "customer");
}

struct TravelNetwork {
    owner: User,
    owner_token: String,
    staff_token: String,
    committee_id: Value,
    vehicle_id: Value,
    seat_ids: Vec<Value>,
}

impl TestApp {
    async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, Some(token), Some(body)).await
    }

    async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, Some(token), None).await
    }

    async fn place(&self, admin: &str, name: &str) -> Value {
        let (status, place) = self.post("/v1/admin/places", admin, json!({ "name": name })).await;
        assert_eq!(status, StatusCode::OK, "{}", place);
        place["id"].clone()
    }

    /// A committee with a booking and boarding clerk and a two-seat vehicle
    /// priced 1500 with 1200 going to the committee.
    async fn travel_network(&self, admin: &str) -> TravelNetwork {
        let (owner, owner_token) = self.user("9833333333", "Committee Owner").await;
        let (staff, staff_token) = self.user("9844444444", "Counter Staff").await;
        let from_place = self.place(admin, "Kathmandu").await;
        let to_place = self.place(admin, "Pokhara").await;

        let (status, committee) = self
            .post("/v1/admin/travel/committees", admin, json!({ "user_id": owner.id, "name": "Pokhara Yatayat" }))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, created) = self
            .post(
                "/v1/admin/travel/vehicles",
                admin,
                json!({
                    "committee_id": committee["id"],
                    "name": "Night Express",
                    "vehicle_no": "GA 1 KHA 77",
                    "from_place": from_place,
                    "to_place": to_place,
                    "departure_time": "19:00:00",
                    "seat_price": "1500",
                    "actual_seat_price": "1200",
                    "seats": [{ "floor": "lower", "side": "A", "count": 2 }]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", created);

        let (status, _) = self
            .post(
                "/v1/travel/staff",
                &owner_token,
                json!({ "user_id": staff.id, "booking_permission": true, "boarding_permission": true }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        TravelNetwork {
            owner,
            owner_token,
            staff_token,
            committee_id: committee["id"].clone(),
            vehicle_id: created["vehicle"]["id"].clone(),
            seat_ids: created["seats"].as_array().unwrap().iter().map(|s| s["id"].clone()).collect(),
        }
    }
}

fn booking_request(vehicle_id: &Value, seat_id: &Value) -> Value {
    json!({
        "vehicle_id": vehicle_id,
        "seat_ids": [seat_id],
        "booking_date": Utc::now().to_rfc3339(),
        "name": "Hari",
        "phone": "9855555555",
        "gender": "male"
    })
}

#[tokio::test]
async fn test_travel_booking_and_boarding_pays_out() {
    let t = TestApp::new();
    let admin = t.admin().await;
    let net = t.travel_network(&admin).await;
    let (owner_token, staff_token) = (&net.owner_token, &net.staff_token);

    let booking_request = booking_request(&net.vehicle_id, &net.seat_ids[0]);
    let (status, bookings) = t.post("/v1/travel/bookings", staff_token, booking_request.clone()).await;
    assert_eq!(status, StatusCode::OK, "{}", bookings);
    let booking = &bookings[0];
    let ticket = booking["ticket_number"].as_str().unwrap().to_string();
    assert!(ticket.starts_with("TKT-"));
    assert_eq!(booking["status"], "booked");
    assert_eq!(money(&booking["system_commission"]), dec!(300));

    // The seat is gone for everyone else.
    let (status, _) = t.post("/v1/travel/bookings", staff_token, booking_request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, scanned) = t.post("/v1/travel/boarding/scan", staff_token, json!({ "qr_code": ticket })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scanned["id"], booking["id"]);

    let confirm = format!("/v1/travel/boarding/{}/confirm", booking["id"].as_str().unwrap());
    let (status, boarded) = t.post(&confirm, staff_token, json!({})).await;
    assert_eq!(status, StatusCode::OK, "{}", boarded);
    assert_eq!(boarded["booking"]["status"], "boarded");
    assert_eq!(boarded["transactions"].as_array().unwrap().len(), 2);

    let (_, wallet) = t.get("/v1/wallet", owner_token).await;
    assert_eq!(money(&wallet["balance"]), dec!(1200));
    assert_eq!(t.state.wallet.balance(Account::System).await.unwrap(), dec!(300));

    let (status, _) = t.post(&confirm, staff_token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "a boarded ticket cannot board twice");
    assert_eq!(t.state.wallet.balance(Account::System).await.unwrap(), dec!(300));
    assert_eq!(t.state.metrics.event_count("commission_distributed"), 1);

    let (_, stats) = t.get("/v1/travel/revenue/stats", owner_token).await;
    assert_eq!(money(&stats["today"]), dec!(1200));
}

#[tokio::test]
async fn test_unknown_places_are_rejected() {
    let t = TestApp::new();
    let admin = t.admin().await;
    let net = t.travel_network(&admin).await;
    let bhaktapur = t.place(&admin, "Bhaktapur").await;

    let (status, body) = t
        .post(
            "/v1/admin/travel/vehicles",
            &admin,
            json!({
                "committee_id": net.committee_id,
                "name": "Ghost Coach",
                "vehicle_no": "BA 9 KHA 1",
                "from_place": bhaktapur,
                "to_place": Uuid::new_v4(),
                "departure_time": "07:00:00",
                "seat_price": "900",
                "actual_seat_price": "800",
                "seats": []
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("to_place"));

    let mut request = booking_request(&net.vehicle_id, &net.seat_ids[0]);
    request["boarding_place"] = json!(Uuid::new_v4());
    let (status, _) = t.post("/v1/travel/bookings", &net.staff_token, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .post("/v1/admin/taxi/trips", &admin, json!({ "from_place": bhaktapur, "to_place": Uuid::new_v4() }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_deactivated_agent_books_as_customer() {
    let t = TestApp::new();
    let admin = t.admin().await;
    let net = t.travel_network(&admin).await;
    let (agent_user, agent_token) = t.user("9812121212", "Agent").await;

    let (status, agent) = t
        .post(
            "/v1/admin/travel/agents",
            &admin,
            json!({
                "user_id": agent_user.id,
                "commission_type": "flat",
                "commission_value": "50",
                "committee_ids": [net.committee_id]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", agent);
    let (_, me) = t.get("/v1/me", &agent_token).await;
    assert_eq!(me["travel_role"], "agent");

    let uri = format!("/v1/admin/travel/agents/{}", id(&agent));
    let (status, updated) = t.put(&uri, &admin, json!({ "commission_value": "60" })).await;
    assert_eq!(status, StatusCode::OK, "{}", updated);
    assert_eq!(money(&updated["commission_value"]), dec!(60));

    let (status, deactivated) = t.delete(&uri, &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deactivated["is_active"], false);

    let (_, me) = t.get("/v1/me", &agent_token).await;
    assert_eq!(me["travel_role"], "customer");
    let (status, _) = t
        .post("/v1/travel/bookings", &agent_token, booking_request(&net.vehicle_id, &net.seat_ids[0]))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_withdrawal_request_and_review() {
    let t = TestApp::new();
    let admin = t.admin().await;
    let net = t.travel_network(&admin).await;
    let token = &net.owner_token;

    // Earn 1200 through a boarding payout.
    let (_, bookings) = t
        .post("/v1/travel/bookings", &net.staff_token, booking_request(&net.vehicle_id, &net.seat_ids[1]))
        .await;
    let confirm = format!("/v1/travel/boarding/{}/confirm", id(&bookings[0]));
    let (status, _) = t.post(&confirm, &net.staff_token, json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let bank = json!({
        "account_holder_name": "Committee Owner",
        "bank_name": "Nabil Bank",
        "account_number": "0012345678",
        "ifsc": "NARBNPKA"
    });
    let (status, _) = t.post("/v1/withdrawals", token, json!({ "amount": "100", "bank": bank })).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "only merchants withdraw");

    let roles = format!("/v1/admin/users/{}/roles", net.owner.id);
    let (status, _) = t.put(&roles, &admin, json!({ "is_merchant": true })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t.post("/v1/withdrawals", token, json!({ "amount": "100" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "no approved payment setting or bank details");

    let (status, setting) = t
        .post(
            "/v1/payment-settings",
            token,
            json!({ "method": "bank_account", "details": bank }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", setting);
    let approve_setting = format!("/v1/admin/payment-settings/{}/approve", id(&setting));
    let (status, _) = t.post(&approve_setting, &admin, json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, first) = t.post("/v1/withdrawals", token, json!({ "amount": "1000" })).await;
    assert_eq!(status, StatusCode::OK, "{}", first);
    assert_eq!(first["status"], "pending");
    let (_, wallet) = t.get("/v1/wallet", token).await;
    assert_eq!(money(&wallet["available"]), dec!(200));
    let (status, _) = t.post("/v1/withdrawals", token, json!({ "amount": "300" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "pending requests hold their amount");

    let reject = format!("/v1/admin/withdrawals/{}/reject", id(&first));
    let (status, _) = t.post(&reject, &admin, json!({ "reason": " " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, rejected) = t.post(&reject, &admin, json!({ "reason": "Account name mismatch" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["status"], "rejected");
    let (status, _) = t.post(&reject, &admin, json!({ "reason": "Again" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, second) = t.post("/v1/withdrawals", token, json!({ "amount": "700" })).await;
    let approve = format!("/v1/admin/withdrawals/{}/approve", id(&second));
    let (status, approved) = t.post(&approve, &admin, json!({})).await;
    assert_eq!(status, StatusCode::OK, "{}", approved);
    assert_eq!(approved["status"], "approved");
    let (status, _) = t.post(&approve, &admin, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, wallet) = t.get("/v1/wallet", token).await;
    assert_eq!(money(&wallet["balance"]), dec!(500));
    assert_eq!(money(&wallet["outstanding_withdrawals"]), dec!(0));
}

#[tokio::test]
async fn test_taxi_bookings_are_capped_by_fleet_size() {
    let t = TestApp::new();
    let admin = t.admin().await;
    let (driver, driver_token) = t.user("9866666666", "Driver").await;
    let (_, first_customer) = t.user("9877777777", "First").await;
    let (_, second_customer) = t.user("9888888888", "Second").await;

    let (status, _) = t
        .post("/v1/admin/taxi/drivers", &admin, json!({ "user_id": driver.id, "license": "BA-1234" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = t
        .post("/v1/taxi/driver/vehicles", &driver_token, json!({ "name": "Swift", "vehicle_no": "BA 2 CHA 11" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let from_place = t.place(&admin, "Butwal").await;
    let to_place = t.place(&admin, "Bhairahawa").await;
    let (status, trip) = t
        .post("/v1/admin/taxi/trips", &admin, json!({ "from_place": from_place, "to_place": to_place }))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", trip);
    let (_, seater) = t
        .post("/v1/admin/taxi/seaters", &admin, json!({ "trip_id": trip["id"], "seat": "Front", "price": "800" }))
        .await;

    let request = json!({
        "trip_id": trip["id"],
        "seater_id": seater["id"],
        "date": (Utc::now() + Duration::days(1)).date_naive(),
        "time": "09:00:00"
    });
    let (status, booking) = t.post("/v1/taxi/bookings", &first_customer, request.clone()).await;
    assert_eq!(status, StatusCode::OK, "{}", booking);
    assert_eq!(money(&booking["price"]), dec!(800));

    let (status, body) = t.post("/v1/taxi/bookings", &second_customer, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("All vehicles are booked"));

    let (_, open) = t.get("/v1/taxi/driver/bookings/open", &driver_token).await;
    assert_eq!(open.as_array().unwrap().len(), 1);

    let accept = format!("/v1/taxi/driver/bookings/{}/accept", id(&booking));
    let (status, accepted) = t.post(&accept, &driver_token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["trip_status"], "confirmed");

    let (status, _) = t.post(&accept, &driver_token, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_checkout_and_delivery_settle_merchant_payout() {
    let t = TestApp::new();
    let admin = t.admin().await;
    let (merchant, merchant_token) = t.user("9899999999", "Merchant").await;
    let (_, customer) = t.user("9810101010", "Customer").await;

    let (status, _) = t.post("/v1/merchant/stores", &merchant_token, json!({ "name": "Shop", "address": "Lakeside", "phone": "061" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "only merchants open stores");

    let (status, _) = t
        .call(
            Method::PUT,
            &format!("/v1/admin/users/{}/roles", merchant.id),
            Some(&admin),
            Some(json!({ "is_merchant": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, store) = t
        .post("/v1/merchant/stores", &merchant_token, json!({ "name": "Lakeside Kitchenware", "address": "Lakeside", "phone": "061" }))
        .await;
    let (_, category) = t.post("/v1/admin/shop/categories", &admin, json!({ "name": "Kitchen" })).await;
    let (status, product) = t
        .post(
            "/v1/merchant/products",
            &merchant_token,
            json!({
                "store_id": store["id"],
                "category_id": category["id"],
                "name": "Kettle",
                "price": "100",
                "sku": "KET-1",
                "stock_quantity": 5
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", product);

    let (status, cart) = t.post("/v1/shop/cart", &customer, json!({ "product_id": product["id"], "quantity": 2 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(money(&cart["subtotal"]), dec!(200));

    let (status, orders) = t
        .post("/v1/shop/checkout", &customer, json!({ "shipping_address": "Ward 6, Pokhara", "phone": "9810101010" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", orders);
    let order = &orders[0];
    assert_eq!(order["status"], "confirmed");
    assert_eq!(order["payment_status"], "success");
    assert_eq!(money(&order["total"]), dec!(200));

    let (_, cart) = t.get("/v1/shop/cart", &customer).await;
    assert_eq!(cart["item_count"], 0);
    let (_, stocked) = t.get(&format!("/v1/shop/products/{}", id(&product)), &customer).await;
    assert_eq!(stocked["stock_quantity"], 3);

    let status_uri = format!("/v1/merchant/orders/{}/status", id(order));
    let (status, _) = t.post(&status_uri, &merchant_token, json!({ "status": "delivered" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "orders cannot skip steps");

    let mut last = Value::Null;
    for step in ["processing", "shipped", "delivered"] {
        let (status, change) = t.post(&status_uri, &merchant_token, json!({ "status": step })).await;
        assert_eq!(status, StatusCode::OK, "{}", change);
        last = change;
    }
    assert_eq!(last["order"]["commission_processed"], true);
    assert_eq!(money(&last["settlement"]["commission"]), dec!(20));
    assert_eq!(money(&last["settlement"]["payout"]), dec!(180));

    let (_, wallet) = t.get("/v1/wallet", &merchant_token).await;
    assert_eq!(money(&wallet["balance"]), dec!(180));
    assert_eq!(t.state.metrics.event_count("order_delivered"), 1);
}

#[tokio::test]
async fn test_reviews_and_wishlist() {
    let t = TestApp::new();
    let admin = t.admin().await;
    let (merchant, merchant_token) = t.user("9813131313", "Merchant").await;
    let (_, customer) = t.user("9814141414", "Customer").await;
    let (_, other) = t.user("9815151515", "Other").await;

    let roles = format!("/v1/admin/users/{}/roles", merchant.id);
    t.put(&roles, &admin, json!({ "is_merchant": true })).await;
    let (_, store) = t
        .post("/v1/merchant/stores", &merchant_token, json!({ "name": "Thamel Crafts", "address": "Thamel", "phone": "01" }))
        .await;
    let (_, category) = t.post("/v1/admin/shop/categories", &admin, json!({ "name": "Crafts" })).await;
    let (status, product) = t
        .post(
            "/v1/merchant/products",
            &merchant_token,
            json!({
                "store_id": store["id"],
                "category_id": category["id"],
                "name": "Singing Bowl",
                "price": "45",
                "sku": "SB-1",
                "stock_quantity": 3
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", product);
    let reviews = format!("/v1/shop/products/{}/reviews", id(&product));

    let (status, _) = t.post(&reviews, &customer, json!({ "rating": 6, "comment": "Great" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, review) = t.post(&reviews, &customer, json!({ "rating": 4, "comment": "Lovely tone" })).await;
    assert_eq!(status, StatusCode::CREATED, "{}", review);
    assert_eq!(review["is_verified_purchase"], false);
    let (status, _) = t.post(&reviews, &customer, json!({ "rating": 5, "comment": "Again" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let review_uri = format!("/v1/shop/reviews/{}", id(&review));
    let (status, _) = t.put(&review_uri, &other, json!({ "rating": 1, "comment": "Not mine" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, revised) = t.put(&review_uri, &customer, json!({ "rating": 5, "comment": "Even better" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(revised["rating"], 5);

    let (status, listed) = t.call(Method::GET, &reviews, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let wish = json!({ "product_id": product["id"] });
    let (status, _) = t.post("/v1/shop/wishlist", &customer, wish.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, entry) = t.post("/v1/shop/wishlist", &customer, wish).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["product"]["name"], "Singing Bowl");
    let (_, wishlist) = t.get("/v1/shop/wishlist", &customer).await;
    assert_eq!(wishlist.as_array().unwrap().len(), 1);

    let (status, _) = t.delete(&format!("/v1/shop/wishlist/{}", id(&product)), &customer).await;
    assert_eq!(status, StatusCode::OK);
    let (_, wishlist) = t.get("/v1/shop/wishlist", &customer).await;
    assert!(wishlist.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_addresses_and_notifications() {
    let t = TestApp::new();
    let admin = t.admin().await;
    let (user, token) = t.user("9816161616", "Sita").await;
    let (_, other) = t.user("9817171717", "Other").await;

    let address = |title: &str, is_default: bool| {
        json!({
            "title": title,
            "full_name": "Sita Sharma",
            "phone": "9816161616",
            "address": "Ward 4",
            "city": "Pokhara",
            "state": "Gandaki",
            "zip_code": "33700",
            "is_default": is_default
        })
    };
    let (status, home) = t.post("/v1/addresses", &token, address("Home", true)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", home);
    let (_, office) = t.post("/v1/addresses", &token, address("Office", true)).await;

    let (_, listed) = t.get("/v1/addresses", &token).await;
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["id"], office["id"]);
    assert_eq!(listed[1]["is_default"], false);

    let home_uri = format!("/v1/addresses/{}", id(&home));
    let (status, _) = t.put(&home_uri, &other, address("Mine now", false)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = t.delete(&home_uri, &token).await;
    assert_eq!(status, StatusCode::OK);

    for title in ["Order shipped", "Festival sale"] {
        let (status, _) = t
            .post(
                "/v1/admin/notifications",
                &admin,
                json!({ "user_id": user.id, "title": title, "message": "Open the app for details" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, unread) = t.get("/v1/notifications?unread=true", &token).await;
    assert_eq!(unread.as_array().unwrap().len(), 2);
    assert_eq!(unread[0]["notification_type"], "general");

    let (_, marked) = t.post(&format!("/v1/notifications/{}/read", id(&unread[0])), &token, json!({})).await;
    assert_eq!(marked["updated"], 1);
    let (_, marked) = t.post("/v1/notifications/read", &token, json!({})).await;
    assert_eq!(marked["updated"], 1);
    let (_, unread) = t.get("/v1/notifications?unread=true", &token).await;
    assert!(unread.as_array().unwrap().is_empty());
    let (_, all) = t.get("/v1/notifications", &other).await;
    assert!(all.as_array().unwrap().is_empty());
}
