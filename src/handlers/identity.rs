//! Staff identity assertions.
//!
//! The identity service itself is an external collaborator; by the time a
//! request reaches this service the gateway has already verified the bearer
//! token and forwards the role-scoped assertions as trusted headers. The
//! kitchen surface deliberately carries no identity at all and never goes
//! through this extractor.

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use uuid::Uuid;

use crate::application::order_service::EditCaller;
use crate::domain::ports::ViewScope;
use crate::errors::AppError;

pub const RESTAURANT_HEADER: &str = "X-Restaurant-Id";
pub const ROLE_HEADER: &str = "X-Role";
pub const STAFF_HEADER: &str = "X-Staff-Id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaffRole {
    Admin,
    Waiter,
    Rider,
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub restaurant_id: Uuid,
    pub role: StaffRole,
    pub staff_id: Option<Uuid>,
}

impl Identity {
    /// Which slice of the tenant's orders this surface observes.
    pub fn scope(&self) -> ViewScope {
        match self.role {
            StaffRole::Admin => ViewScope::All,
            StaffRole::Waiter => ViewScope::DiningRoom,
            StaffRole::Rider => ViewScope::Delivery,
        }
    }

    pub fn edit_caller(&self) -> EditCaller {
        match self.role {
            StaffRole::Admin => EditCaller::Admin,
            // staff_id presence is enforced at extraction time
            StaffRole::Waiter => EditCaller::Waiter(self.staff_id.unwrap_or_default()),
            StaffRole::Rider => EditCaller::Rider,
        }
    }
}

fn header<'r>(req: &'r HttpRequest, name: &str) -> Option<&'r str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

fn parse_identity(req: &HttpRequest) -> Result<Identity, AppError> {
    let restaurant_id = header(req, RESTAURANT_HEADER)
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or(AppError::Forbidden)?;

    let role = match header(req, ROLE_HEADER) {
        Some("admin") => StaffRole::Admin,
        Some("waiter") => StaffRole::Waiter,
        Some("rider") => StaffRole::Rider,
        _ => return Err(AppError::Forbidden),
    };

    let staff_id = match header(req, STAFF_HEADER) {
        Some(raw) => Some(Uuid::parse_str(raw).map_err(|_| AppError::Forbidden)?),
        None => None,
    };
    if staff_id.is_none() && role != StaffRole::Admin {
        return Err(AppError::Forbidden);
    }

    Ok(Identity {
        restaurant_id,
        role,
        staff_id,
    })
}

impl FromRequest for Identity {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(parse_identity(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn request(headers: &[(&str, String)]) -> HttpRequest {
        let mut req = TestRequest::default();
        for (name, value) in headers {
            req = req.insert_header((name.to_string(), value.clone()));
        }
        req.to_http_request()
    }

    #[test]
    fn admin_needs_no_staff_id() {
        let restaurant = Uuid::new_v4();
        let req = request(&[
            (RESTAURANT_HEADER, restaurant.to_string()),
            (ROLE_HEADER, "admin".to_string()),
        ]);
        let identity = parse_identity(&req).unwrap();
        assert_eq!(identity.restaurant_id, restaurant);
        assert_eq!(identity.scope(), ViewScope::All);
    }

    #[test]
    fn waiter_without_staff_id_is_forbidden() {
        let req = request(&[
            (RESTAURANT_HEADER, Uuid::new_v4().to_string()),
            (ROLE_HEADER, "waiter".to_string()),
        ]);
        assert!(matches!(
            parse_identity(&req).unwrap_err(),
            AppError::Forbidden
        ));
    }

    #[test]
    fn rider_scope_is_delivery_only() {
        let req = request(&[
            (RESTAURANT_HEADER, Uuid::new_v4().to_string()),
            (ROLE_HEADER, "rider".to_string()),
            (STAFF_HEADER, Uuid::new_v4().to_string()),
        ]);
        assert_eq!(parse_identity(&req).unwrap().scope(), ViewScope::Delivery);
    }

    #[test]
    fn unknown_role_is_forbidden() {
        let req = request(&[
            (RESTAURANT_HEADER, Uuid::new_v4().to_string()),
            (ROLE_HEADER, "chef".to_string()),
            (STAFF_HEADER, Uuid::new_v4().to_string()),
        ]);
        assert!(parse_identity(&req).is_err());
    }

    #[test]
    fn missing_restaurant_is_forbidden() {
        let req = request(&[(ROLE_HEADER, "admin".to_string())]);
        assert!(parse_identity(&req).is_err());
    }
}
