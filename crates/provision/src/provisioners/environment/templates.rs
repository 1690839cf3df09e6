//! Static container build files.

/// `backend/Dockerfile`: PHP-FPM and nginx under supervisord.
pub const BACKEND_DOCKERFILE: &str = r#"FROM php:8.2-fpm-alpine

# System dependencies
RUN apk add --no-cache \
    git \
    curl \
    libpng-dev \
    libzip-dev \
    zip \
    unzip \
    nginx \
    supervisor \
    icu-dev

# PHP extensions
RUN docker-php-ext-install pdo pdo_mysql zip gd exif intl

# Redis extension
RUN apk add --no-cache $PHPIZE_DEPS \
    && pecl install redis \
    && docker-php-ext-enable redis

COPY --from=composer:latest /usr/bin/composer /usr/bin/composer

WORKDIR /var/www/html

COPY . .

RUN mkdir -p /var/www/html/storage/framework/views \
    /var/www/html/storage/framework/cache \
    /var/www/html/storage/framework/sessions \
    /var/www/html/storage/logs \
    /var/www/html/bootstrap/cache
RUN chown -R www-data:www-data /var/www/html/storage /var/www/html/bootstrap/cache

RUN if [ -f composer.json ]; then composer install --no-interaction --optimize-autoloader --no-dev; fi

COPY docker/nginx.conf /etc/nginx/nginx.conf

RUN printf '%s\n' \
    '[supervisord]' \
    'nodaemon=true' \
    '' \
    '[program:php-fpm]' \
    'command=php-fpm' \
    'autostart=true' \
    'autorestart=true' \
    '' \
    '[program:nginx]' \
    "command=nginx -g 'daemon off;'" \
    'autostart=true' \
    'autorestart=true' \
    > /etc/supervisord.conf

EXPOSE 80

CMD ["/usr/bin/supervisord", "-c", "/etc/supervisord.conf"]
"#;

/// `backend/docker/nginx.conf`.
pub const NGINX_CONF: &str = r#"user www-data;
worker_processes auto;
error_log /var/log/nginx/error.log;
pid /run/nginx.pid;

events {
    worker_connections 1024;
}

http {
    include /etc/nginx/mime.types;
    default_type application/octet-stream;

    log_format main '$remote_addr - $remote_user [$time_local] "$request" '
                    '$status $body_bytes_sent "$http_referer" '
                    '"$http_user_agent" "$http_x_forwarded_for"';

    access_log /var/log/nginx/access.log main;

    sendfile on;
    tcp_nopush on;
    keepalive_timeout 65;
    gzip on;

    server {
        listen 80;
        server_name localhost;
        root /var/www/html/public;

        index index.php index.html;

        location / {
            try_files $uri $uri/ /index.php?$query_string;
        }

        location ~ \.php$ {
            fastcgi_pass 127.0.0.1:9000;
            fastcgi_index index.php;
            fastcgi_param SCRIPT_FILENAME $document_root$fastcgi_script_name;
            include fastcgi_params;
        }

        location ~ /\.ht {
            deny all;
        }
    }
}
"#;

/// `frontend/Dockerfile`: dev server once a project exists, idle until then.
pub const FRONTEND_DOCKERFILE: &str = r#"FROM node:20-alpine

WORKDIR /app

COPY . .

RUN if [ -f package.json ]; then npm install; fi

EXPOSE 3000

CMD ["sh", "-c", "if [ -f package.json ]; then npm run dev; else echo 'No package.json found. Waiting for setup...' && tail -f /dev/null; fi"]
"#;

pub const BACKEND_DOCKERIGNORE: &str = "node_modules
vendor
.env
.git
.gitignore
storage/logs/*
storage/framework/cache/*
storage/framework/sessions/*
storage/framework/views/*
";

pub const FRONTEND_DOCKERIGNORE: &str = "node_modules
.next
.git
.gitignore
.env*.local
";
