use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub locale: Option<String>,
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    pub locale: Option<String>,
}
