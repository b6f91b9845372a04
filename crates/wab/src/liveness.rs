//! Keep-alive endpoint for external process monitors.

use axum::{http::header, response::IntoResponse, Router};

pub const ALIVE_BODY: &str = "Bot activo ✅\n";

/// Every path and method answers `200 text/plain`.
pub fn router() -> Router {
    Router::new().fallback(alive)
}

/// Serve `app` alongside the keep-alive endpoint. `app` keeps its routes; any
/// other request, including a known path hit with an unrouted method, is
/// answered as alive.
pub fn with_routes(app: Router) -> Router {
    router().merge(app).method_not_allowed_fallback(alive)
}

async fn alive() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], ALIVE_BODY)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn serve(app: Router) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn any_path_and_method_is_alive() {
        let addr = serve(router()).await;
        let http = reqwest::Client::new();

        let resp = http.get(format!("http://{addr}/")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(resp.text().await.unwrap(), ALIVE_BODY);

        let resp = http
            .post(format!("http://{addr}/some/where?x=1"))
            .body("ignored")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(resp.text().await.unwrap(), ALIVE_BODY);
    }

    #[tokio::test]
    async fn merged_routes_keep_priority() {
        let app = with_routes(Router::new().route(
            "/webhook/evolution",
            axum::routing::post(|| async { axum::http::StatusCode::ACCEPTED }),
        ));
        let addr = serve(app).await;
        let http = reqwest::Client::new();

        let resp = http
            .post(format!("http://{addr}/webhook/evolution"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::ACCEPTED);

        let resp = http
            .get(format!("http://{addr}/health"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.text().await.unwrap(), ALIVE_BODY);

        for method in [reqwest::Method::GET, reqwest::Method::PUT, reqwest::Method::DELETE] {
            let resp = http
                .request(method.clone(), format!("http://{addr}/webhook/evolution"))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), reqwest::StatusCode::OK, "{method}");
            assert_eq!(resp.text().await.unwrap(), ALIVE_BODY);
        }
    }
}
