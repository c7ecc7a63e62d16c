use crate::conf::Conf;
use crate::rest::error::{json_error_handler, query_error_handler};
use crate::rest::v1::plots;
use crate::{db, Result};
use actix_web::dev::Service;
use actix_web::middleware::{Compress, NormalizePath};
use actix_web::web::{scope, Data, JsonConfig, QueryConfig, ServiceConfig};
use actix_web::{App, HttpServer};
use futures_util::future::FutureExt;
use std::time::Instant;
use tracing::{info, warn};

pub async fn run(conf: Conf) -> Result<()> {
    // All the worker threads are sharing a single connection pool
    let pool = db::pool(&conf.db_path)?;
    let slow_request_secs = conf.slow_request_secs;

    info!(
        db_path = %conf.db_path.display(),
        bind_addr = %conf.bind_addr,
        port = conf.port,
        "Starting server"
    );

    HttpServer::new(move || {
        App::new()
            .wrap_fn(move |req, srv| {
                let req_method = req.method().as_str().to_string();
                let req_path = req.path().to_string();
                let req_query_string = req.query_string().to_string();
                let req_real_ip = req
                    .connection_info()
                    .realip_remote_addr()
                    .unwrap_or_default()
                    .to_string();
                let started_at = Instant::now();
                srv.call(req).map(move |res| {
                    if let Ok(res) = res.as_ref() {
                        let res_status = res.status().as_u16();
                        let res_time_sec = started_at.elapsed().as_secs_f64();
                        if res_time_sec > slow_request_secs {
                            warn!(
                                req_method,
                                req_path,
                                req_query_string,
                                req_real_ip,
                                res_status,
                                res_time_sec,
                                "Slow request"
                            );
                        }
                    }
                    res
                })
            })
            .wrap(NormalizePath::trim())
            .wrap(Compress::default())
            .app_data(Data::new(pool.clone()))
            .configure(routes)
    })
    .bind((conf.bind_addr.as_str(), conf.port))?
    .run()
    .await?;

    Ok(())
}

pub fn routes(cfg: &mut ServiceConfig) {
    cfg.app_data(QueryConfig::default().error_handler(query_error_handler))
        .app_data(JsonConfig::default().error_handler(json_error_handler))
        .service(
            scope("api").service(
                scope("plots")
                    .service(plots::get)
                    .service(plots::get_by_id)
                    .service(plots::post)
                    .service(plots::put)
                    .service(plots::patch)
                    .service(plots::delete)
                    .service(plots::options),
            ),
        );
}

#[cfg(test)]
mod test {
    use crate::db::test::pool;
    use crate::rest::v1::plots::Item;
    use crate::Result;
    use actix_web::http::StatusCode;
    use actix_web::middleware::NormalizePath;
    use actix_web::test::TestRequest;
    use actix_web::web::Data;
    use actix_web::{test, App};
    use serde_json::{json, Value};

    #[test]
    async fn create_and_list_plots() -> Result<()> {
        let app = test::init_service(
            App::new()
                .wrap(NormalizePath::trim())
                .app_data(Data::new(pool()))
                .configure(super::routes),
        )
        .await;
        let body = json!({
            "name": "North Field",
            "coordinates": {"type": "Point", "coordinates": [-7.5, 33.4]},
            "area": 2.5,
            "exploitation": "Bouskoura",
            "crop_type": "cereals",
            "has_manager": false
        });
        let req = TestRequest::post()
            .uri("/api/plots/")
            .set_json(&body)
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(StatusCode::CREATED, res.status());
        let created: Value = test::read_body_json(res).await;
        assert!(created["id"].is_i64());
        assert_eq!(body["coordinates"], created["coordinates"]);

        let req = TestRequest::get().uri("/api/plots").to_request();
        let res: Vec<Item> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(1, res.len());
        assert_eq!("North Field", res[0].name);

        let req = TestRequest::get()
            .uri(&format!("/api/plots/{}/", created["id"]))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(StatusCode::OK, res.status());
        Ok(())
    }

    #[test]
    async fn malformed_body() -> Result<()> {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(pool()))
                .configure(super::routes),
        )
        .await;
        let req = TestRequest::post()
            .uri("/api/plots")
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"name\": ")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(StatusCode::BAD_REQUEST, res.status());
        let res: Value = test::read_body_json(res).await;
        assert_eq!("invalid_input", res["code"]);
        Ok(())
    }
}
