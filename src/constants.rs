pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const SUBSCRIPTION_COUNT_PER_PAGE: i64 = 6;

pub const MAX_NAME_LENGTH: usize = 200;
pub const MAX_COOKING_TIME: i64 = 32_767;

pub const IMAGE_DIRECTORY: &str = "recipes/images";
pub const DEFAULT_IMAGE_EXTENSION: &str = "png";

pub const SESSION_COOKIE: &str = "session";
pub const SESSION_LIFETIME_HOURS: i64 = 1;

pub const SHOPPING_LIST_FILENAME: &str = "shopping_cart.txt";
