pub const RECIPE_NAME_MAX_LENGTH: usize = 256;
pub const COOKING_TIME_MIN: i32 = 1;
pub const COOKING_TIME_MAX: i32 = 1440;
pub const INGREDIENT_AMOUNT_MIN: i32 = 1;

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const NAME_MAX_LENGTH: usize = 150;
pub const PASSWORD_MIN_LENGTH: usize = 8;

pub const SHORT_CODE_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
pub const SHORT_CODE_DEFAULT_LENGTH: usize = 6;
pub const SHORT_CODE_MAX_LENGTH: usize = 8;
pub const SHORT_CODE_MIN_ATTEMPTS: u64 = 10;
pub const SHORT_CODE_MAX_ATTEMPTS: u64 = 10_000;

pub const SHOPPING_LIST_HEADER: &str = "Shopping list:";
pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";

pub const SESSION_COOKIE: &str = "session";
pub const DEFAULT_SESSION_LIFETIME_HOURS: i64 = 24;
