use anyhow::{bail, Result};
use reqwest::{Response, StatusCode};
use serde::Serialize;

use crate::api::*;

pub struct Client {
    url: String,
    client: reqwest::Client,
}
impl Client {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::new();
        Self { url, client }
    }
    async fn post<T: Serialize>(&self, path: &str, request: &T) -> Result<Response> {
        let response = self
            .client
            .post(self.url.clone() + path)
            .json(request)
            .send()
            .await?;
        check(response).await
    }
    pub async fn new_wheel(&self, name: String) -> Result<RowId> {
        let response = self.post("/new_wheel", &NewWheelRequest { name }).await?;
        Ok(response.json::<RowId>().await?)
    }
    pub async fn get_wheels(&self) -> Result<Vec<WheelResponse>> {
        let response = self
            .client
            .get(self.url.clone() + "/get_wheels")
            .send()
            .await?;
        Ok(check(response).await?.json::<Vec<WheelResponse>>().await?)
    }
    pub async fn get_wheel(&self, wheel: RowId) -> Result<WheelResponse> {
        let response = self.post("/get_wheel", &WheelRequest { wheel }).await?;
        Ok(response.json::<WheelResponse>().await?)
    }
    pub async fn add_prize(&self, request: AddPrizeRequest) -> Result<RowId> {
        let response = self.post("/add_prize", &request).await?;
        Ok(response.json::<RowId>().await?)
    }
    pub async fn update_prize(&self, request: UpdatePrizeRequest) -> Result<()> {
        self.post("/update_prize", &request).await?;
        Ok(())
    }
    pub async fn remove_prize(&self, prize: RowId) -> Result<()> {
        self.post("/remove_prize", &PrizeRequest { prize }).await?;
        Ok(())
    }
    pub async fn spin(&self, request: SpinRequest) -> Result<SpinResponse> {
        let response = self.post("/spin", &request).await?;
        Ok(response.json::<SpinResponse>().await?)
    }
    pub async fn get_spin(&self, code: RedemptionCode) -> Result<SpinRecord> {
        let response = self.post("/get_spin", &RedemptionRequest { code }).await?;
        Ok(response.json::<SpinRecord>().await?)
    }
    pub async fn redeem(&self, code: RedemptionCode) -> Result<()> {
        self.post("/redeem", &RedemptionRequest { code }).await?;
        Ok(())
    }
    pub async fn get_stats(&self, wheel: RowId) -> Result<WheelStats> {
        let response = self.post("/get_stats", &WheelRequest { wheel }).await?;
        Ok(response.json::<WheelStats>().await?)
    }
}
/// Turns every status other than 200 and 201 into an error carrying the
/// status and the server's message.
async fn check(response: Response) -> Result<Response> {
    match response.status() {
        StatusCode::OK | StatusCode::CREATED => Ok(response),
        status => bail!("{}: {}", status.as_u16(), response.text().await?),
    }
}
