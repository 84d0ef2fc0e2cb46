pub(crate) const fn _default_ssh_port() -> u16 {
    22
}

pub(crate) const fn _default_false() -> bool {
    false
}

#[inline]
pub(crate) fn _default_remote_path() -> String {
    ".".to_owned()
}

pub const PRODUCTION_API_BASE_URL: &str = "https://apim-anpost-mailslabels.anpost.com/returnsapi/v2";
pub const TEST_API_BASE_URL: &str =
    "https://apim-anpost-mailslabels-nonprod.dev-anpost.com/returnsapi-q/v2";
