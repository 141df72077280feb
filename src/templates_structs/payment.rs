use askama::Template;

#[derive(Template)]
#[template(path = "payment/checkout.html")]
pub struct CheckoutTemplate {
    pub app_name: String,
    pub csrf_token: String,
    pub display_name: String,
    pub amount: String,
    pub retry: bool,
    pub error: Option<String>,
    /// Provider checkout page; absent when a session could not be created.
    pub checkout_url: Option<String>,
}

#[derive(Template)]
#[template(path = "payment/result.html")]
pub struct PaymentResultTemplate {
    pub app_name: String,
    pub success: bool,
    pub message: String,
}
