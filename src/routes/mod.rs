// 인증 관련 핸들러와 헬스 체크
mod auth;
mod health_check;

pub use auth::{
    get_current_user, login, refresh_token, register, AuthResult, CurrentUserResponse,
    LoginRequest, RegisterRequest, TokenRequest,
};
pub use health_check::health_check;
